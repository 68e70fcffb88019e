use std::sync::Arc;

use sneakerdesk_core::config::CatalogProfile;
use sneakerdesk_core::{ParameterKind, ToolDescriptor};

/// Immutable set of tools advertised to the model.
///
/// Built once at startup and shared by reference; cloning only bumps a refcount.
#[derive(Clone, Debug)]
pub struct ToolCatalog {
    profile: CatalogProfile,
    descriptors: Arc<[ToolDescriptor]>,
}

impl ToolCatalog {
    pub fn for_profile(profile: CatalogProfile) -> Self {
        let descriptors = match profile {
            CatalogProfile::Storefront => storefront_tools(),
            CatalogProfile::Extended => {
                let mut tools = storefront_tools();
                tools.extend(sensitive_tools());
                tools
            }
        };

        Self { profile, descriptors: descriptors.into() }
    }

    pub fn storefront() -> Self {
        Self::for_profile(CatalogProfile::Storefront)
    }

    pub fn extended() -> Self {
        Self::for_profile(CatalogProfile::Extended)
    }

    pub fn profile(&self) -> CatalogProfile {
        self.profile
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.descriptors.iter().find(|descriptor| descriptor.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|descriptor| descriptor.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::storefront()
    }
}

fn storefront_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new("update_price", "Update the price of a product")
            .required_param("product_id", ParameterKind::String, "Product ID, e.g. SHOE001")
            .required_param("new_price", ParameterKind::Number, "New price in USD"),
        ToolDescriptor::new("process_refund", "Process a refund for a customer")
            .required_param("order_id", ParameterKind::String, "Order ID to refund")
            .required_param("amount", ParameterKind::Number, "Refund amount in USD")
            .param("reason", ParameterKind::String, "Reason for the refund"),
        ToolDescriptor::new("change_user_role", "Change a user's account role or permissions")
            .required_param("user_id", ParameterKind::String, "User ID to update")
            .required_param(
                "new_role",
                ParameterKind::String,
                "New role, e.g. admin, customer, moderator",
            ),
        ToolDescriptor::new("get_all_customers", "Retrieve all customer information"),
    ]
}

fn sensitive_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "get_confidential_pricing",
            "Retrieve internal cost and margin data for products",
        )
        .param("product_id", ParameterKind::String, "Optional product ID to narrow the lookup"),
        ToolDescriptor::new(
            "get_customer_details",
            "Retrieve full account, address and payment details for one customer",
        )
        .required_param("customer_id", ParameterKind::String, "Customer ID, e.g. CUST001"),
    ]
}
