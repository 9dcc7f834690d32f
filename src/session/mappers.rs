//! Mapper registry.
//!
//! Mappers are identified by type. Any `'static` type can serve as a descriptor,
//! including trait-object types, so a mapper interface declared as a trait is
//! registered with `MapperType::of::<dyn UserMapper>()`.

use crate::error::{BatisError, BatisResult};
use std::any::TypeId;
use std::collections::HashMap;
use tracing::debug;

/// Type descriptor of a mapper interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapperType {
    id: TypeId,
    name: &'static str,
}

impl MapperType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Display for MapperType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapperRegistry {
    mappers: HashMap<TypeId, MapperType>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mapper type. Registering the same type twice is an error.
    pub fn add_mapper(&mut self, mapper: MapperType) -> BatisResult<()> {
        if self.mappers.contains_key(&mapper.id) {
            return Err(BatisError::setup_usage(
                format!("Type {} is already known to the mapper registry", mapper),
                "Register each mapper type once",
            ));
        }
        debug!(mapper = %mapper, "Mapper registered");
        self.mappers.insert(mapper.id, mapper);
        Ok(())
    }

    pub fn has_mapper(&self, mapper: MapperType) -> bool {
        self.mappers.contains_key(&mapper.id)
    }

    /// Registered mapper types, sorted by name.
    pub fn mapper_types(&self) -> Vec<MapperType> {
        let mut types: Vec<MapperType> = self.mappers.values().copied().collect();
        types.sort_by_key(|m| m.name);
        types
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    trait UserMapper {
        fn find_by_id(&self, id: i64);
    }

    #[allow(dead_code)]
    trait OrderMapper {
        fn list(&self);
    }

    #[test]
    fn test_has_mapper_after_add() {
        let mut registry = MapperRegistry::new();
        let user = MapperType::of::<dyn UserMapper>();

        assert!(!registry.has_mapper(user));
        registry.add_mapper(user).unwrap();
        assert!(registry.has_mapper(user));
        assert!(!registry.has_mapper(MapperType::of::<dyn OrderMapper>()));
    }

    #[test]
    fn test_duplicate_mapper_rejected() {
        let mut registry = MapperRegistry::new();
        registry
            .add_mapper(MapperType::of::<dyn UserMapper>())
            .unwrap();
        let err = registry
            .add_mapper(MapperType::of::<dyn UserMapper>())
            .unwrap_err();
        assert!(matches!(err, BatisError::SetupUsage { .. }));
        assert!(err.to_string().contains("UserMapper"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concrete_types_are_descriptors_too() {
        struct LegacyDao;
        let mut registry = MapperRegistry::new();
        registry.add_mapper(MapperType::of::<LegacyDao>()).unwrap();
        assert!(registry.has_mapper(MapperType::of::<LegacyDao>()));
        assert_eq!(registry.mapper_types().len(), 1);
    }
}
