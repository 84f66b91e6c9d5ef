use triview_model::{Entity, Status};

pub fn definition(id: &str, name: &str) -> Entity {
    Entity::definition(id).with_name(name)
}

pub fn usage(id: &str, of: &str) -> Entity {
    Entity::usage(id, of)
}

pub fn dependency(id: &str, source: &str, target: &str) -> Entity {
    Entity::dependency(id, source, target)
}

pub fn numbered_definitions(count: usize) -> Vec<Entity> {
    (0..count)
        .map(|i| Entity::definition(format!("R-{i:03}")).with_name(format!("Requirement {i}")))
        .collect()
}

/// Small braking-system model: three definitions, four usages, two
/// dependencies, one usage pointing at a definition that is never served
pub fn sample_model() -> Vec<Entity> {
    vec![
        Entity::definition("R-1")
            .with_name("Braking distance")
            .with_short_name("BRK")
            .with_text("Stop within 40 m from 100 km/h")
            .with_status(Status::Approved),
        Entity::definition("R-2")
            .with_name("Pedal force")
            .with_short_name("PED")
            .with_status(Status::Proposed),
        Entity::definition("R-3")
            .with_name("Warning lamp")
            .with_status(Status::Draft),
        Entity::usage("U-1", "R-1")
            .with_name("Front axle braking")
            .with_status(Status::Approved),
        Entity::usage("U-2", "R-1").with_name("Rear axle braking"),
        Entity::usage("U-3", "R-2")
            .with_name("Pedal assembly")
            .with_status(Status::Approved),
        Entity::usage("U-4", "R-404").with_name("Legacy lamp"),
        Entity::dependency("D-1", "U-1", "U-3"),
        Entity::dependency("D-2", "U-2", "R-404"),
    ]
}
