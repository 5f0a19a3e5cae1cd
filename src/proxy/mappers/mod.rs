// Mappers module - protocol conversion

pub mod vertex;
