//! Field table of the user-pool client resource
//!
//! One row per attribute. Wire names are the members of the directory
//! service's `UserPoolClient` structure.

use declarative::{
    BlockSpec, ElemCheck, FieldDefault, FieldSpec, IdentitySpec, ResourceSchema, UpdateMode,
};

/// Resource type name used in configuration addresses
pub const TYPE_NAME: &str = "user_pool_client";

/// Authentication flows a client may enable
pub const EXPLICIT_AUTH_FLOWS: &[&str] = &[
    "ADMIN_NO_SRP_AUTH",
    "CUSTOM_AUTH_FLOW_ONLY",
    "USER_PASSWORD_AUTH",
    "ALLOW_ADMIN_USER_PASSWORD_AUTH",
    "ALLOW_CUSTOM_AUTH",
    "ALLOW_USER_PASSWORD_AUTH",
    "ALLOW_USER_SRP_AUTH",
    "ALLOW_REFRESH_TOKEN_AUTH",
];

pub const OAUTH_FLOWS: &[&str] = &["code", "implicit", "client_credentials"];

pub const PREVENT_USER_EXISTENCE_ERRORS: &[&str] = &["ENABLED", "LEGACY"];

/// Refresh token lifetime in days when not configured
pub const DEFAULT_REFRESH_TOKEN_VALIDITY: i64 = 30;

static ANALYTICS_CONFIGURATION: BlockSpec = BlockSpec {
    fields: &[
        FieldSpec::string("application_id", "ApplicationId"),
        FieldSpec::string("application_arn", "ApplicationArn")
            .check(ElemCheck::Arn)
            .conflicts_with(&["external_id", "role_arn"]),
        FieldSpec::string("external_id", "ExternalId").conflicts_with(&["application_arn"]),
        FieldSpec::string("role_arn", "RoleArn")
            .computed()
            .check(ElemCheck::Arn)
            .conflicts_with(&["application_arn"]),
        FieldSpec::bool("user_data_shared", "UserDataShared").default(FieldDefault::Bool(false)),
    ],
    exactly_one_of: &["application_id", "application_arn"],
};

/// An application client registered against a user pool
///
/// Addressed by `(user_pool_id, client_id)`. The update call overwrites the
/// whole client configuration, and the service does not keep an empty list
/// apart from an omitted one.
pub static USER_POOL_CLIENT: ResourceSchema = ResourceSchema {
    type_name: TYPE_NAME,
    fields: &[
        FieldSpec::string("name", "ClientName").required(),
        FieldSpec::string("user_pool_id", "UserPoolId").required().force_new(),
        FieldSpec::string("client_secret", "ClientSecret").output().sensitive(),
        FieldSpec::bool("generate_secret", "GenerateSecret")
            .force_new()
            .create_only()
            .unreported()
            .default(FieldDefault::Bool(false)),
        FieldSpec::string_set("explicit_auth_flows", "ExplicitAuthFlows")
            .check(ElemCheck::OneOf(EXPLICIT_AUTH_FLOWS)),
        FieldSpec::string_set("read_attributes", "ReadAttributes"),
        FieldSpec::string_set("write_attributes", "WriteAttributes"),
        FieldSpec::int("refresh_token_validity", "RefreshTokenValidity", 0, 3650)
            .default(FieldDefault::Int(DEFAULT_REFRESH_TOKEN_VALIDITY)),
        FieldSpec::string_set("allowed_oauth_flows", "AllowedOAuthFlows")
            .max_items(3)
            .check(ElemCheck::OneOf(OAUTH_FLOWS)),
        FieldSpec::bool("allowed_oauth_flows_user_pool_client", "AllowedOAuthFlowsUserPoolClient")
            .default(FieldDefault::Bool(false)),
        FieldSpec::string_set("allowed_oauth_scopes", "AllowedOAuthScopes")
            .max_items(50)
            .check(ElemCheck::OAuthScope),
        FieldSpec::string_set("callback_urls", "CallbackURLs")
            .max_items(100)
            .check(ElemCheck::Url),
        FieldSpec::string("default_redirect_uri", "DefaultRedirectURI"),
        FieldSpec::string_set("logout_urls", "LogoutURLs")
            .max_items(100)
            .check(ElemCheck::Url),
        FieldSpec::string("prevent_user_existence_errors", "PreventUserExistenceErrors")
            .computed()
            .check(ElemCheck::OneOf(PREVENT_USER_EXISTENCE_ERRORS)),
        FieldSpec::string_set("supported_identity_providers", "SupportedIdentityProviders"),
        FieldSpec::block(
            "analytics_configuration",
            "AnalyticsConfiguration",
            &ANALYTICS_CONFIGURATION,
        ),
    ],
    identity: IdentitySpec {
        parent_field: "user_pool_id",
        id_wire: "ClientId",
    },
    update_mode: UpdateMode::Replace,
    distinguishes_empty_sets: false,
};

/// Every resource type this crate knows
pub static SCHEMAS: &[&ResourceSchema] = &[&USER_POOL_CLIENT];

/// Look up a resource type by name
pub fn schema_for(type_name: &str) -> Option<&'static ResourceSchema> {
    SCHEMAS.iter().copied().find(|s| s.type_name == type_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Document, Value, ViolationKind, validate};

    fn minimal() -> Document {
        Document::new().with("name", "app1").with("user_pool_id", "pool1")
    }

    fn urls(n: usize) -> Value {
        Value::set((0..n).map(|i| format!("https://app.example.com/cb/{i}")))
    }

    #[test]
    fn test_minimal_client_is_valid() {
        assert!(validate(&USER_POOL_CLIENT, &minimal()).is_empty());
    }

    #[test]
    fn test_callback_url_cardinality() {
        let ok = minimal().with("callback_urls", urls(100));
        assert!(validate(&USER_POOL_CLIENT, &ok).is_empty());

        let too_many = minimal().with("callback_urls", urls(101));
        let violations = validate(&USER_POOL_CLIENT, &too_many);
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations.0[0].kind,
            ViolationKind::TooManyItems {
                max: 100,
                found: 101
            }
        );
    }

    #[test]
    fn test_oauth_flows_enum_and_cardinality() {
        let doc = minimal().with("allowed_oauth_flows", Value::set(["code", "password"]));
        let violations = validate(&USER_POOL_CLIENT, &doc);
        assert!(violations.mentions("allowed_oauth_flows"));
    }

    #[test]
    fn test_analytics_exactly_one_of() {
        let both = minimal().with(
            "analytics_configuration",
            Document::new()
                .with("application_id", "app-1")
                .with("application_arn", "arn:aws:mobiletargeting:us-east-1:123456789012:apps/app-1"),
        );
        assert!(validate(&USER_POOL_CLIENT, &both).mentions("analytics_configuration"));

        let neither = minimal().with(
            "analytics_configuration",
            Document::new().with("external_id", "ext"),
        );
        assert!(validate(&USER_POOL_CLIENT, &neither).mentions("analytics_configuration"));

        let one = minimal().with(
            "analytics_configuration",
            Document::new()
                .with("application_id", "app-1")
                .with("role_arn", "arn:aws:iam::123456789012:role/analytics"),
        );
        assert!(validate(&USER_POOL_CLIENT, &one).is_empty());
    }

    #[test]
    fn test_application_arn_conflicts() {
        let doc = minimal().with(
            "analytics_configuration",
            Document::new()
                .with("application_arn", "arn:aws:mobiletargeting:us-east-1:123456789012:apps/app-1")
                .with("external_id", "ext"),
        );
        let violations = validate(&USER_POOL_CLIENT, &doc);
        assert!(violations.mentions("analytics_configuration.application_arn"));
        assert!(violations.mentions("analytics_configuration.external_id"));
    }

    #[test]
    fn test_client_secret_is_not_input() {
        let doc = minimal().with("client_secret", "hunter2");
        let violations = validate(&USER_POOL_CLIENT, &doc);
        assert!(violations.mentions("client_secret"));
        assert!(!violations.to_string().contains("hunter2"));
    }

    #[test]
    fn test_schema_for() {
        assert!(schema_for("user_pool_client").is_some());
        assert!(schema_for("user_pool").is_none());
    }
}
