//! Managed NEOS resources, one [`Reconciler`](crate::reconcile::Reconciler)
//! per entity kind.

pub mod account;
pub mod data_product;
pub mod data_product_builder;
pub mod data_source;
pub mod data_unit;
pub mod entity;
pub mod group;
pub mod link;
pub mod output;
pub mod registry_core;
pub mod secret;
pub mod user;
pub mod user_policy;

use crate::reconcile::Catalogue;

pub use account::AccountResource;
pub use data_product::DataProductResource;
pub use data_product_builder::DataProductBuilderResource;
pub use data_source::DataSourceResource;
pub use data_unit::DataUnitResource;
pub use entity::DataSystemResource;
pub use group::GroupResource;
pub use link::LinkResource;
pub use output::OutputResource;
pub use registry_core::RegistryCoreResource;
pub use secret::SecretResource;
pub use user::UserResource;
pub use user_policy::UserPolicyResource;

/// Register every resource type.
pub fn register(catalogue: Catalogue) -> Catalogue {
    catalogue
        .with_resource::<AccountResource>()
        .with_resource::<DataSystemResource>()
        .with_resource::<DataSourceResource>()
        .with_resource::<DataUnitResource>()
        .with_resource::<DataProductResource>()
        .with_resource::<DataProductBuilderResource>()
        .with_resource::<OutputResource>()
        .with_resource::<LinkResource<link::SystemToSource>>()
        .with_resource::<LinkResource<link::SourceToUnit>>()
        .with_resource::<LinkResource<link::UnitToProduct>>()
        .with_resource::<LinkResource<link::ProductToOutput>>()
        .with_resource::<LinkResource<link::ProductToProduct>>()
        .with_resource::<GroupResource>()
        .with_resource::<UserResource>()
        .with_resource::<UserPolicyResource>()
        .with_resource::<SecretResource>()
        .with_resource::<RegistryCoreResource>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::ResourceEntry;

    #[test]
    fn test_every_resource_is_registered_once() {
        let catalogue = register(Catalogue::new());
        let mut names: Vec<_> = catalogue.resources().iter().map(|e| e.type_name()).collect();
        assert_eq!(names.len(), 17);
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 17);
        assert!(names.iter().all(|n| n.starts_with("neos_")));
    }

    #[test]
    fn test_import_sets_identifier() {
        let catalogue = register(Catalogue::new());
        for entry in catalogue.resources() {
            let imported = entry.import("x-1");
            let key = if entry.type_name() == "neos_registry_core" { "urn" } else { "id" };
            assert_eq!(imported[key], "x-1", "{}", entry.type_name());
        }
    }

    #[test]
    fn test_group_config_validates() {
        let entry = ResourceEntry::of::<GroupResource>();
        let config = serde_json::json!({"name": "analysts", "principals": ["u1"]});
        assert!(entry.validate(&config).is_empty());
    }
}
