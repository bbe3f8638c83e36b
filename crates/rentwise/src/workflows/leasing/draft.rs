//! Property-creation wizard as a pure reducer.
//!
//! `property_type` and `bedrooms` are coupled: a studio has no separate bedroom. The field the
//! user touched last wins and the other one is derived from it, so no event can bounce back
//! and forth between the two.

use serde::{Deserialize, Serialize};

use super::domain::{Location, PropertyType};
use super::service::NewProperty;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Basics,
    Location,
    Pricing,
    Details,
    Review,
}

impl WizardStep {
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Basics => Some(Self::Location),
            Self::Location => Some(Self::Pricing),
            Self::Pricing => Some(Self::Details),
            Self::Details => Some(Self::Review),
            Self::Review => None,
        }
    }

    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::Basics => None,
            Self::Location => Some(Self::Basics),
            Self::Pricing => Some(Self::Location),
            Self::Details => Some(Self::Pricing),
            Self::Review => Some(Self::Details),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftEvent {
    SetPropertyType(PropertyType),
    SetBedrooms(u8),
    SetLocation(Location),
    SetPrice { price: u64, currency: String },
    AddAmenity(String),
    RemoveAmenity(String),
    AddRule(String),
    SetLeaseTemplate(String),
    Next,
    Back,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("choose a property type")]
    MissingPropertyType,
    #[error("address and city are required")]
    MissingLocation,
    #[error("country is required")]
    MissingCountry,
    #[error("monthly rent must be greater than zero")]
    MissingPrice,
    #[error("currency must be a three-letter code, got '{0}'")]
    InvalidCurrency(String),
    #[error("the draft is already on the review step")]
    AlreadyAtReview,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDraft {
    pub step: WizardStep,
    pub property_type: Option<PropertyType>,
    pub bedrooms: u8,
    pub location: Option<Location>,
    pub price: u64,
    pub currency: String,
    pub amenities: Vec<String>,
    pub rules: Vec<String>,
    pub lease_template: String,
}

impl Default for PropertyDraft {
    fn default() -> Self {
        Self {
            step: WizardStep::Basics,
            property_type: None,
            bedrooms: 1,
            location: None,
            price: 0,
            currency: "USD".to_string(),
            amenities: Vec::new(),
            rules: Vec::new(),
            lease_template: String::new(),
        }
    }
}

impl PropertyDraft {
    /// Applies one event. Step navigation validates; field edits never fail.
    pub fn apply(mut self, event: DraftEvent) -> Result<Self, DraftError> {
        match event {
            DraftEvent::SetPropertyType(kind) => {
                self.property_type = Some(kind);
                self.bedrooms = bedrooms_for_type(kind, self.bedrooms);
            }
            DraftEvent::SetBedrooms(bedrooms) => {
                self.bedrooms = bedrooms;
                self.property_type = type_for_bedrooms(bedrooms, self.property_type);
            }
            DraftEvent::SetLocation(location) => self.location = Some(location),
            DraftEvent::SetPrice { price, currency } => {
                self.price = price;
                self.currency = currency.trim().to_ascii_uppercase();
            }
            DraftEvent::AddAmenity(amenity) => push_unique(&mut self.amenities, amenity),
            DraftEvent::RemoveAmenity(amenity) => {
                self.amenities.retain(|existing| !existing.eq_ignore_ascii_case(&amenity))
            }
            DraftEvent::AddRule(rule) => push_unique(&mut self.rules, rule),
            DraftEvent::SetLeaseTemplate(template) => self.lease_template = template,
            DraftEvent::Next => {
                self.validate_step(self.step)?;
                self.step = self.step.next().ok_or(DraftError::AlreadyAtReview)?;
            }
            DraftEvent::Back => {
                if let Some(previous) = self.step.previous() {
                    self.step = previous;
                }
            }
        }
        Ok(self)
    }

    pub fn validate_step(&self, step: WizardStep) -> Result<(), DraftError> {
        match step {
            WizardStep::Basics => {
                self.property_type.ok_or(DraftError::MissingPropertyType)?;
            }
            WizardStep::Location => {
                let location = self.location.as_ref().ok_or(DraftError::MissingLocation)?;
                if location.address.trim().is_empty() || location.city.trim().is_empty() {
                    return Err(DraftError::MissingLocation);
                }
                if location.country.trim().is_empty() {
                    return Err(DraftError::MissingCountry);
                }
            }
            WizardStep::Pricing => {
                if self.price == 0 {
                    return Err(DraftError::MissingPrice);
                }
                if !is_currency_code(&self.currency) {
                    return Err(DraftError::InvalidCurrency(self.currency.clone()));
                }
            }
            WizardStep::Details | WizardStep::Review => {}
        }
        Ok(())
    }

    /// Validates every step and produces the create-property payload.
    pub fn into_new_property(self) -> Result<NewProperty, DraftError> {
        for step in [WizardStep::Basics, WizardStep::Location, WizardStep::Pricing] {
            self.validate_step(step)?;
        }
        let property_type = self.property_type.ok_or(DraftError::MissingPropertyType)?;
        let location = self.location.ok_or(DraftError::MissingLocation)?;

        Ok(NewProperty {
            price: self.price,
            currency: self.currency,
            location,
            property_type,
            bedrooms: self.bedrooms,
            amenities: self.amenities,
            rules: self.rules,
            lease_template: self.lease_template,
        })
    }
}

fn bedrooms_for_type(kind: PropertyType, current: u8) -> u8 {
    match kind {
        PropertyType::Studio => 0,
        _ if current == 0 => 1,
        _ => current,
    }
}

fn type_for_bedrooms(bedrooms: u8, current: Option<PropertyType>) -> Option<PropertyType> {
    match (bedrooms, current) {
        (0, _) => Some(PropertyType::Studio),
        (_, Some(PropertyType::Studio)) => Some(PropertyType::Apartment),
        (_, other) => other,
    }
}

fn push_unique(items: &mut Vec<String>, value: String) {
    let value = value.trim().to_string();
    if value.is_empty() || items.iter().any(|item| item.eq_ignore_ascii_case(&value)) {
        return;
    }
    items.push(value);
}

pub(crate) fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|ch| ch.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> Location {
        Location {
            address: "123 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            country: "US".to_string(),
            postal_code: "62701".to_string(),
        }
    }

    fn apply_all(events: Vec<DraftEvent>) -> Result<PropertyDraft, DraftError> {
        events
            .into_iter()
            .try_fold(PropertyDraft::default(), PropertyDraft::apply)
    }

    #[test]
    fn studio_type_zeroes_bedrooms() {
        let draft = apply_all(vec![
            DraftEvent::SetBedrooms(3),
            DraftEvent::SetPropertyType(PropertyType::Studio),
        ])
        .expect("edits apply");

        assert_eq!(draft.bedrooms, 0);
        assert_eq!(draft.property_type, Some(PropertyType::Studio));
    }

    #[test]
    fn later_bedroom_edit_overrides_studio() {
        let draft = apply_all(vec![
            DraftEvent::SetPropertyType(PropertyType::Studio),
            DraftEvent::SetBedrooms(2),
        ])
        .expect("edits apply");

        assert_eq!(draft.property_type, Some(PropertyType::Apartment));
        assert_eq!(draft.bedrooms, 2);

        let draft = draft
            .apply(DraftEvent::SetBedrooms(0))
            .expect("edit applies");
        assert_eq!(draft.property_type, Some(PropertyType::Studio));
    }

    #[test]
    fn leaving_studio_restores_a_bedroom() {
        let draft = apply_all(vec![
            DraftEvent::SetPropertyType(PropertyType::Studio),
            DraftEvent::SetPropertyType(PropertyType::House),
        ])
        .expect("edits apply");

        assert_eq!(draft.bedrooms, 1);
    }

    #[test]
    fn next_validates_the_current_step() {
        let result = PropertyDraft::default().apply(DraftEvent::Next);
        assert_eq!(result, Err(DraftError::MissingPropertyType));

        let draft = apply_all(vec![
            DraftEvent::SetPropertyType(PropertyType::House),
            DraftEvent::Next,
            DraftEvent::SetLocation(location()),
            DraftEvent::Next,
            DraftEvent::SetPrice {
                price: 0,
                currency: "usd".to_string(),
            },
        ])
        .expect("first two steps pass");
        assert_eq!(draft.step, WizardStep::Pricing);
        assert_eq!(draft.currency, "USD");
        assert_eq!(draft.apply(DraftEvent::Next), Err(DraftError::MissingPrice));
    }

    #[test]
    fn complete_draft_becomes_new_property() {
        let draft = apply_all(vec![
            DraftEvent::SetPropertyType(PropertyType::Apartment),
            DraftEvent::SetBedrooms(2),
            DraftEvent::SetLocation(location()),
            DraftEvent::SetPrice {
                price: 145_000,
                currency: "USD".to_string(),
            },
            DraftEvent::AddAmenity("Parking".to_string()),
            DraftEvent::AddAmenity("parking".to_string()),
            DraftEvent::AddRule("No smoking".to_string()),
        ])
        .expect("edits apply");

        let property = draft.into_new_property().expect("draft is complete");
        assert_eq!(property.bedrooms, 2);
        assert_eq!(property.amenities, vec!["Parking".to_string()]);
        assert_eq!(property.rules, vec!["No smoking".to_string()]);
    }
}
