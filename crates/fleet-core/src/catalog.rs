//! Sample part catalog and the default initial stocking.

use crate::types::Part;

/// The automotive part catalog the simulator ships with.
pub fn sample_parts() -> Vec<Part> {
    vec![
        Part::new("P1001", "Oil Filter", "Standard oil filter"),
        Part::new("P1002", "Air Filter", "Engine air filter"),
        Part::new("P1003", "Spark Plug", "Iridium spark plug"),
        Part::new("P1004", "Brake Pad", "Front ceramic pads"),
        Part::new("P1005", "Brake Disc", "Vented front brake disc"),
        Part::new("P1006", "Wiper Blade", "22-inch all-weather"),
        Part::new("P1007", "Headlight Bulb", "H4 Halogen bulb"),
        Part::new("P1A008", "Taillight Bulb", "P21W bulb"),
        Part::new("P1009", "Battery", "12V 60Ah AGM battery"),
        Part::new("P1010", "Alternator", "120A alternator"),
        Part::new("P1S11", "Starter Motor", "1.4kW starter"),
        Part::new("P1012", "Timing Belt", "Rubber timing belt kit"),
        Part::new("P1013", "Water Pump", "Coolant water pump"),
        Part::new("P1014", "Radiator", "Aluminum core radiator"),
        Part::new("P1015", "Tire", "205/55R16 All-Season"),
        Part::new("P1016", "Wheel Rim", "16-inch alloy rim"),
        Part::new("P1017", "Shock Absorber", "Front gas shock"),
        Part::new("P1018", "Exhaust Muffler", "Stainless steel muffler"),
        Part::new("P1019", "Catalytic Converter", "OEM spec converter"),
        Part::new("P1020", "Fuel Injector", "Bosch fuel injector"),
    ]
}

/// Default stocking: the first ten catalog parts carry stock, the rest are
/// catalog-only and start at zero availability.
pub fn initial_stock() -> Vec<(Part, i32)> {
    let quantities = [25, 30, 50, 20, 50, 25, 30, 50, 20, 40];
    sample_parts()
        .into_iter()
        .take(quantities.len())
        .zip(quantities)
        .collect()
}
