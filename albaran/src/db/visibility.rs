//! Which clients, projects and delivery notes a user may see.
//!
//! A user without a company sees only what they own. A user with a company additionally sees every
//! record whose company snapshot carries the same company name. The match is plain string
//! equality on the name: two accounts that pick the same name independently share visibility.

use crate::db::models::company::Company;
use crate::db::models::users::UserDBResponse;
use crate::types::UserId;
use sqlx::{Postgres, QueryBuilder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    Owner(UserId),
    OwnerOrCompany { owner: UserId, company_name: String },
}

impl Visibility {
    pub fn new(user_id: UserId, company: Option<&Company>) -> Self {
        match company {
            Some(company) if !company.name.is_empty() => Visibility::OwnerOrCompany {
                owner: user_id,
                company_name: company.name.clone(),
            },
            _ => Visibility::Owner(user_id),
        }
    }

    pub fn for_user(user: &UserDBResponse) -> Self {
        Self::new(user.id, user.company.as_ref())
    }

    pub fn owner(&self) -> UserId {
        match self {
            Visibility::Owner(owner) | Visibility::OwnerOrCompany { owner, .. } => *owner,
        }
    }

    /// In-process form of the filter.
    pub fn permits(&self, owner_id: UserId, company: Option<&Company>) -> bool {
        match self {
            Visibility::Owner(owner) => *owner == owner_id,
            Visibility::OwnerOrCompany { owner, company_name } => {
                *owner == owner_id || company.is_some_and(|c| &c.name == company_name)
            }
        }
    }

    /// Append the filter as a parenthesised predicate over `owner_id` and `company_name`.
    pub fn push_sql(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Visibility::Owner(owner) => {
                builder.push("(owner_id = ").push_bind(*owner).push(")");
            }
            Visibility::OwnerOrCompany { owner, company_name } => {
                builder
                    .push("(owner_id = ")
                    .push_bind(*owner)
                    .push(" OR company_name = ")
                    .push_bind(company_name.clone())
                    .push(")");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn company(name: &str) -> Company {
        Company {
            name: name.to_string(),
            tax_id: "B12345678".to_string(),
            address: "Calle Mayor 1".to_string(),
        }
    }

    #[test]
    fn test_without_company_only_own_records() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let visibility = Visibility::new(me, None);

        assert!(visibility.permits(me, None));
        assert!(visibility.permits(me, Some(&company("Acme"))));
        assert!(!visibility.permits(other, Some(&company("Acme"))));
        assert!(!visibility.permits(other, None));
    }

    #[test]
    fn test_empty_company_name_is_no_company() {
        let me = Uuid::new_v4();
        assert_eq!(Visibility::new(me, Some(&company(""))), Visibility::Owner(me));
    }

    #[test]
    fn test_company_mates_share_records() {
        let me = Uuid::new_v4();
        let mate = Uuid::new_v4();
        let visibility = Visibility::new(me, Some(&company("Acme")));

        assert!(visibility.permits(mate, Some(&company("Acme"))));
        assert!(!visibility.permits(mate, Some(&company("Acme Two"))));
        assert!(!visibility.permits(mate, None));
        assert_eq!(visibility.owner(), me);
    }

    #[test]
    fn test_push_sql() {
        let me = Uuid::new_v4();

        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM clients WHERE ");
        Visibility::Owner(me).push_sql(&mut builder);
        assert_eq!(builder.sql(), "SELECT * FROM clients WHERE (owner_id = $1)");

        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM clients WHERE ");
        Visibility::new(me, Some(&company("Acme"))).push_sql(&mut builder);
        assert_eq!(
            builder.sql(),
            "SELECT * FROM clients WHERE (owner_id = $1 OR company_name = $2)"
        );
    }
}
