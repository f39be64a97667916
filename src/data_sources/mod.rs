//! Read-only listings, one [`DataReader`](crate::reconcile::DataReader)
//! per data source kind.
//!
//! Every listing is a single computed attribute holding a list of objects,
//! plus whatever optional filter arguments the kind accepts.

pub mod entities;
pub mod iam;
pub mod links;
pub mod registry;

use serde::Deserialize;

use crate::reconcile::Catalogue;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

pub use entities::EntityListing;
pub use iam::{AccountsReader, GroupsReader, UserPoliciesReader, UsersReader};
pub use links::LinksReader;
pub use registry::RegistryCoresReader;

/// Arguments of a listing that takes none.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoArguments {}

/// Schema of a listing: one computed list of objects with string fields,
/// except those named in `bools`.
pub(crate) fn listing_schema(
    description: &str,
    attribute: &str,
    fields: &[&str],
    bools: &[&str],
) -> Schema {
    let object = AttributeType::object(fields.iter().map(|name| {
        let ty = if bools.contains(name) {
            AttributeType::Bool
        } else {
            AttributeType::String
        };
        (*name, ty)
    }));
    Schema::v0().with_description(description).with_attribute(
        attribute,
        Attribute::new(AttributeType::list(object), AttributeFlags::computed()),
    )
}

/// Register every data source type.
pub fn register(catalogue: Catalogue) -> Catalogue {
    catalogue
        .with_data_source::<AccountsReader>()
        .with_data_source::<EntityListing<entities::DataSystems>>()
        .with_data_source::<EntityListing<entities::DataSources>>()
        .with_data_source::<EntityListing<entities::DataUnits>>()
        .with_data_source::<EntityListing<entities::DataProducts>>()
        .with_data_source::<EntityListing<entities::Outputs>>()
        .with_data_source::<GroupsReader>()
        .with_data_source::<UsersReader>()
        .with_data_source::<UserPoliciesReader>()
        .with_data_source::<RegistryCoresReader>()
        .with_data_source::<LinksReader>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_data_source_is_registered() {
        let catalogue = register(Catalogue::new());
        let names: Vec<_> = catalogue
            .data_sources()
            .iter()
            .map(|e| e.type_name())
            .collect();
        assert_eq!(names.len(), 11);
        for name in [
            "neos_accounts",
            "neos_data_systems",
            "neos_data_sources",
            "neos_data_units",
            "neos_data_products",
            "neos_outputs",
            "neos_groups",
            "neos_users",
            "neos_user_policies",
            "neos_registry_cores",
            "neos_links",
        ] {
            assert!(names.contains(&name), "{name} missing");
        }
    }

    #[test]
    fn test_listing_attribute_is_computed() {
        let schema = listing_schema("Accounts.", "accounts", &["id", "is_system"], &["is_system"]);
        let attr = schema.attribute("accounts").unwrap();
        assert!(attr.flags.is_computed_only());
        match &attr.attr_type {
            AttributeType::List(inner) => match inner.as_ref() {
                AttributeType::Object(fields) => {
                    assert_eq!(fields["id"], AttributeType::String);
                    assert_eq!(fields["is_system"], AttributeType::Bool);
                }
                other => panic!("expected object, got {other:?}"),
            },
            other => panic!("expected list, got {other:?}"),
        }
    }
}
