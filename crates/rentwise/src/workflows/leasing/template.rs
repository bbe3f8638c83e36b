use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::Property;

/// Built-in agreement used when a landlord has not supplied their own template.
pub const STANDARD_LEASE_TEMPLATE: &str = "\
RESIDENTIAL LEASE AGREEMENT

Premises: {{PROPERTY_ADDRESS}}, {{PROPERTY_CITY}}, {{PROPERTY_STATE}} {{PROPERTY_POSTAL_CODE}}, {{PROPERTY_COUNTRY}}
Unit type: {{PROPERTY_TYPE}} with {{BEDROOMS}} bedroom(s)

Tenant: {{TENANT_NAME}}
Term: from {{LEASE_START_DATE}} to {{LEASE_END_DATE}}

1. RENT. The Tenant shall pay {{MONTHLY_RENT}} {{CURRENCY}} per month, in advance.
2. SECURITY DEPOSIT. The Tenant shall pay a deposit of {{SECURITY_DEPOSIT}} {{CURRENCY}}.
3. AMENITIES. The premises are let together with: {{AMENITIES}}.
4. HOUSE RULES. The Tenant agrees to observe: {{HOUSE_RULES}}.
5. TERMINATION. Either party may initiate termination; any prepaid rent for unused whole
   months is refunded within the grace period.
";

/// Placeholders filled from the property record; anything else stays verbatim.
pub const PROPERTY_PLACEHOLDERS: [&str; 11] = [
    "PROPERTY_ADDRESS",
    "PROPERTY_CITY",
    "PROPERTY_STATE",
    "PROPERTY_COUNTRY",
    "PROPERTY_POSTAL_CODE",
    "PROPERTY_TYPE",
    "BEDROOMS",
    "MONTHLY_RENT",
    "CURRENCY",
    "AMENITIES",
    "HOUSE_RULES",
];

pub fn generate_lease_text_for_template(template: &str, property: &Property) -> String {
    let template = if template.trim().is_empty() {
        STANDARD_LEASE_TEMPLATE
    } else {
        template
    };

    let mut text = template.to_string();
    for placeholder in PROPERTY_PLACEHOLDERS {
        let token = format!("{{{{{placeholder}}}}}");
        if text.contains(&token) {
            text = text.replace(&token, &property_value(placeholder, property));
        }
    }
    text
}

fn property_value(placeholder: &str, property: &Property) -> String {
    let location = &property.location;
    match placeholder {
        "PROPERTY_ADDRESS" => location.address.clone(),
        "PROPERTY_CITY" => location.city.clone(),
        "PROPERTY_STATE" => location.state.clone(),
        "PROPERTY_COUNTRY" => location.country.clone(),
        "PROPERTY_POSTAL_CODE" => location.postal_code.clone(),
        "PROPERTY_TYPE" => property.property_type.label().to_string(),
        "BEDROOMS" => property.bedrooms.to_string(),
        "MONTHLY_RENT" => format_minor_units(property.price),
        "CURRENCY" => property.currency.clone(),
        "AMENITIES" => join_or_none(&property.amenities),
        "HOUSE_RULES" => join_or_none(&property.rules),
        _ => format!("{{{{{placeholder}}}}}"),
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

/// Renders 123456 as "1234.56".
pub fn format_minor_units(amount: u64) -> String {
    format!("{}.{:02}", amount / 100, amount % 100)
}

/// Placeholders still present in a rendered lease, in order of first appearance.
pub fn unresolved_placeholders(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("{{") {
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            break;
        };
        let name = &after[..close];
        if !name.is_empty()
            && name
                .chars()
                .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_')
            && !found.iter().any(|existing| existing == name)
        {
            found.push(name.to_string());
        }
        rest = &after[close + 2..];
    }
    found
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningParty {
    Landlord,
    Tenant,
}

impl fmt::Display for SigningParty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningParty::Landlord => f.write_str("Landlord"),
            SigningParty::Tenant => f.write_str("Tenant"),
        }
    }
}

/// Free-text audit line; nothing here is cryptographically verifiable.
pub fn signature_line(party: SigningParty, name: &str, signed_at: DateTime<Utc>) -> String {
    format!(
        "Digitally Signed by {} ({party}) on {}",
        name.trim(),
        signed_at.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

pub fn append_signature(
    lease_text: &str,
    party: SigningParty,
    name: &str,
    signed_at: DateTime<Utc>,
) -> String {
    let mut text = lease_text.trim_end().to_string();
    text.push_str("\n\n");
    text.push_str(&signature_line(party, name, signed_at));
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::leasing::domain::{
        Location, PropertyId, PropertyStatus, PropertyType, UserId,
    };
    use chrono::TimeZone;

    fn property() -> Property {
        Property {
            id: PropertyId::from("prop-template"),
            landlord_id: UserId::from("landlord-1"),
            current_tenant_id: None,
            price: 145_000,
            currency: "USD".to_string(),
            status: PropertyStatus::Available,
            lease_start_date: None,
            location: Location {
                address: "123 Main St".to_string(),
                city: "Springfield".to_string(),
                state: "IL".to_string(),
                country: "US".to_string(),
                postal_code: "62701".to_string(),
            },
            property_type: PropertyType::Apartment,
            bedrooms: 2,
            amenities: vec!["Parking".to_string(), "Laundry".to_string()],
            rules: Vec::new(),
            lease_template: String::new(),
            images: Vec::new(),
            videos: Vec::new(),
        }
    }

    #[test]
    fn fills_property_fields_and_keeps_unknown_dates() {
        let text = generate_lease_text_for_template(STANDARD_LEASE_TEMPLATE, &property());

        assert!(text.contains("123 Main St, Springfield"));
        assert!(text.contains("1450.00 USD per month"));
        assert!(text.contains("Parking, Laundry"));
        assert!(text.contains("observe: none"));
        assert!(text.contains("{{LEASE_START_DATE}}"));
        assert_eq!(
            unresolved_placeholders(&text),
            vec![
                "TENANT_NAME",
                "LEASE_START_DATE",
                "LEASE_END_DATE",
                "SECURITY_DEPOSIT"
            ]
        );
    }

    #[test]
    fn empty_template_falls_back_to_standard() {
        let text = generate_lease_text_for_template("   ", &property());
        assert!(text.starts_with("RESIDENTIAL LEASE AGREEMENT"));
    }

    #[test]
    fn custom_templates_are_respected() {
        let text = generate_lease_text_for_template(
            "Lease for {{PROPERTY_ADDRESS}} ({{BEDROOMS}} bd) starting {{LEASE_START_DATE}}",
            &property(),
        );
        assert_eq!(text, "Lease for 123 Main St (2 bd) starting {{LEASE_START_DATE}}");
    }

    #[test]
    fn signatures_append_audit_lines() {
        let signed_at = Utc
            .with_ymd_and_hms(2024, 1, 2, 15, 4, 5)
            .single()
            .expect("valid instant");

        let text = append_signature("Body\n", SigningParty::Landlord, " Dana Reyes ", signed_at);
        let text = append_signature(&text, SigningParty::Tenant, "Sam Ortiz", signed_at);

        assert_eq!(
            text,
            "Body\n\nDigitally Signed by Dana Reyes (Landlord) on 2024-01-02 15:04:05 UTC\n\n\
             Digitally Signed by Sam Ortiz (Tenant) on 2024-01-02 15:04:05 UTC"
        );
    }
}
