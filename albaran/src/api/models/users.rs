//! API request/response models for users.

use crate::db::models::company::Company;
use crate::db::models::users::{PersonalData, UserDBResponse};
use crate::db::visibility::Visibility;
use crate::errors::Error;
use crate::types::{ClientId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// Role enum: full accounts and invited guests
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Guest,
}

/// The authenticated caller, reloaded from the store on every request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    pub verified: bool,
    pub company: Option<Company>,
}

impl CurrentUser {
    pub fn visibility(&self) -> Visibility {
        Visibility::new(self.id, self.company.as_ref())
    }

    /// Clients, projects and notes may only be created or changed by verified accounts.
    pub fn require_verified(&self) -> Result<(), Error> {
        if self.verified {
            Ok(())
        } else {
            Err(Error::InsufficientPermissions {
                action: crate::types::Operation::Create,
                resource: "records before verifying your email".to_string(),
            })
        }
    }
}

impl From<&UserDBResponse> for CurrentUser {
    fn from(user: &UserDBResponse) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            verified: user.verified,
            company: user.company.clone(),
        }
    }
}

// Request models

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ValidateRequest {
    /// The 6-digit code returned at registration
    pub code: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PersonalDataRequest {
    pub nombre: String,
    pub apellidos: String,
    pub nif: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CompanyRequest {
    pub nombre: Option<String>,
    pub cif: Option<String>,
    #[serde(default)]
    pub direccion: String,
    /// Self-employed: the company is the person, built from their personal data
    #[serde(default)]
    pub autonomo: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct InviteRequest {
    pub email: String,
}

/// Query parameters for deleting the caller's account
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
pub struct DeleteUserQuery {
    /// Only flag the account as deleted (default). `false` removes it permanently.
    pub soft: Option<bool>,
}

// Response models

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompanyResponse {
    pub nombre: String,
    pub cif: String,
    pub direccion: String,
}

impl From<Company> for CompanyResponse {
    fn from(company: Company) -> Self {
        Self {
            nombre: company.name,
            cif: company.tax_id,
            direccion: company.address,
        }
    }
}

/// Account summary returned by register and login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub role: Role,
    pub verified: bool,
    /// Pending verification code, returned by registration only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub message: String,
    pub user: AuthUser,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub role: Role,
    pub verified: bool,
    pub nombre: Option<String>,
    pub apellidos: Option<String>,
    pub nif: Option<String>,
    pub company: Option<CompanyResponse>,
    pub logo: Option<String>,
    /// Clients created by this user
    #[schema(value_type = Vec<String>)]
    pub clients: Vec<ClientId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn new(user: UserDBResponse, clients: Vec<ClientId>) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            verified: user.verified,
            nombre: user.first_name,
            apellidos: user.last_name,
            nif: user.nif,
            company: user.company.map(Into::into),
            logo: user.logo_path,
            clients,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserUpdatedResponse {
    pub message: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompanyUpdatedResponse {
    pub message: String,
    pub company: CompanyResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LogoResponse {
    pub message: String,
    pub logo: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InviteResponse {
    pub message: String,
    #[schema(value_type = String, format = "uuid")]
    pub guest_id: UserId,
}

// Validation

fn unprocessable(message: &str) -> Error {
    Error::Unprocessable {
        message: message.to_string(),
    }
}

/// 8 to 10 characters drawn from `A-Z` and `0-9`.
fn is_tax_id(value: &str) -> bool {
    (8..=10).contains(&value.len()) && value.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
}

/// Exactly six ASCII digits.
pub fn is_code(value: &str) -> bool {
    value.len() == 6 && value.chars().all(|c| c.is_ascii_digit())
}

impl RegisterRequest {
    pub fn validate(&self, min_password_length: usize) -> Result<(), Error> {
        validate_email(&self.email)?;
        validate_password(&self.password, min_password_length)
    }
}

pub fn validate_email(email: &str) -> Result<(), Error> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(Error::BadRequest {
            message: "Invalid email address".to_string(),
        }),
    }
}

pub fn validate_password(password: &str, min_length: usize) -> Result<(), Error> {
    if password.chars().count() < min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {min_length} characters"),
        });
    }
    Ok(())
}

impl PersonalDataRequest {
    pub fn into_personal_data(self) -> Result<PersonalData, Error> {
        let first_name = self.nombre.trim().to_string();
        let last_name = self.apellidos.trim().to_string();
        let nif = self.nif.trim().to_string();

        if first_name.chars().count() < 2 {
            return Err(unprocessable("nombre must be at least 2 characters"));
        }
        if last_name.chars().count() < 2 {
            return Err(unprocessable("apellidos must be at least 2 characters"));
        }
        if !is_tax_id(&nif) {
            return Err(unprocessable("nif must be 8 to 10 uppercase letters or digits"));
        }

        Ok(PersonalData {
            first_name,
            last_name,
            nif,
        })
    }
}

impl CompanyRequest {
    /// Resolve the company profile to store.
    ///
    /// A self-employed caller must already have complete personal data; the company takes their
    /// full name and NIF.
    pub fn into_company(self, personal: Option<PersonalData>) -> Result<Company, Error> {
        if self.autonomo {
            let personal = personal.ok_or_else(|| Error::BadRequest {
                message: "Complete your personal data before registering as self-employed".to_string(),
            })?;
            return Ok(Company {
                name: format!("{} {}", personal.first_name, personal.last_name),
                tax_id: personal.nif,
                address: validate_address(&self.direccion)?,
            });
        }

        let name = self.nombre.unwrap_or_default().trim().to_string();
        let tax_id = self.cif.unwrap_or_default().trim().to_string();

        if name.chars().count() < 2 {
            return Err(unprocessable("nombre must be at least 2 characters"));
        }
        if !is_tax_id(&tax_id) {
            return Err(unprocessable("cif must be 8 to 10 uppercase letters or digits"));
        }
        let address = validate_address(&self.direccion)?;

        Ok(Company { name, tax_id, address })
    }
}

fn validate_address(direccion: &str) -> Result<String, Error> {
    let address = direccion.trim();
    if address.chars().count() < 5 {
        return Err(unprocessable("direccion must be at least 5 characters"));
    }
    Ok(address.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn personal() -> PersonalData {
        PersonalData {
            first_name: "Ana".to_string(),
            last_name: "García".to_string(),
            nif: "12345678Z".to_string(),
        }
    }

    #[test]
    fn test_personal_data_validation() {
        let ok = PersonalDataRequest {
            nombre: "Ana".to_string(),
            apellidos: "García".to_string(),
            nif: "12345678Z".to_string(),
        };
        assert_eq!(ok.into_personal_data().unwrap(), personal());

        let bad_nif = PersonalDataRequest {
            nombre: "Ana".to_string(),
            apellidos: "García".to_string(),
            nif: "1234z".to_string(),
        };
        assert!(matches!(bad_nif.into_personal_data(), Err(Error::Unprocessable { .. })));
    }

    #[test]
    fn test_self_employed_company_needs_personal_data() {
        let request = CompanyRequest {
            nombre: None,
            cif: None,
            direccion: "Calle Mayor 1".to_string(),
            autonomo: true,
        };
        assert!(matches!(request.clone().into_company(None), Err(Error::BadRequest { .. })));

        let company = request.into_company(Some(personal())).unwrap();
        assert_eq!(company.name, "Ana García");
        assert_eq!(company.tax_id, "12345678Z");
        assert_eq!(company.address, "Calle Mayor 1");

        let short_address = CompanyRequest {
            nombre: None,
            cif: None,
            direccion: " Sol ".to_string(),
            autonomo: true,
        };
        assert!(matches!(
            short_address.into_company(Some(personal())),
            Err(Error::Unprocessable { .. })
        ));
    }

    #[test]
    fn test_company_fields_are_validated() {
        let request = CompanyRequest {
            nombre: Some("Acme SL".to_string()),
            cif: Some("B1234567".to_string()),
            direccion: "Call".to_string(),
            autonomo: false,
        };
        assert!(matches!(request.into_company(None), Err(Error::Unprocessable { .. })));

        // Five characters is the shortest accepted address
        let request = CompanyRequest {
            nombre: Some("Acme SL".to_string()),
            cif: Some("B1234567".to_string()),
            direccion: "  Calle  ".to_string(),
            autonomo: false,
        };
        assert_eq!(request.into_company(None).unwrap().address, "Calle");

        let request = CompanyRequest {
            nombre: Some("Acme SL".to_string()),
            cif: Some("B1234567".to_string()),
            direccion: "Calle Mayor 1".to_string(),
            autonomo: false,
        };
        assert_eq!(request.into_company(None).unwrap().name, "Acme SL");
    }

    #[test]
    fn test_codes_and_emails() {
        assert!(is_code("012345"));
        assert!(!is_code("12345"));
        assert!(!is_code("12345a"));

        assert!(validate_email("a@example.com").is_ok());
        assert!(validate_email("example.com").is_err());
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_value(Role::Guest).unwrap(), "guest");
    }
}
