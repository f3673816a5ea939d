//! Denormalized company profile.

/// Company profile attached to a user and copied onto each client, project and delivery note the
/// user creates.
///
/// The copy is taken at creation time and never refreshed: renaming a company does not move
/// existing records. Records are grouped by `name` alone, so two accounts that independently pick
/// the same company name see each other's records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    pub name: String,
    pub tax_id: String,
    pub address: String,
}

impl Company {
    /// Rebuild a snapshot from its three nullable columns. A missing name means no company.
    pub fn from_columns(name: Option<String>, tax_id: Option<String>, address: Option<String>) -> Option<Self> {
        name.map(|name| Company {
            name,
            tax_id: tax_id.unwrap_or_default(),
            address: address.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_columns() {
        assert_eq!(Company::from_columns(None, Some("B12345678".to_string()), None), None);

        let company = Company::from_columns(Some("Acme SL".to_string()), None, Some("Calle Mayor 1".to_string())).unwrap();
        assert_eq!(company.name, "Acme SL");
        assert_eq!(company.tax_id, "");
        assert_eq!(company.address, "Calle Mayor 1");
    }
}
