//! Event poster field schema.
//!
//! The fixed schema is a struct of named [`Field`]s so every result carries
//! the same keys; anything the capability discovers outside the schema goes
//! to an ordered list of [`ExtraField`]s.

use serde::{Deserialize, Serialize};

/// Names of the fixed schema fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    EventName,
    Date,
    Time,
    VenueName,
    VenueAddress,
    Description,
    Organizer,
    ContactEmail,
    ContactPhone,
    TicketPrice,
    Website,
    RegistrationLink,
}

impl FieldName {
    /// All schema fields in serialization order.
    pub const ALL: [FieldName; 12] = [
        FieldName::EventName,
        FieldName::Date,
        FieldName::Time,
        FieldName::VenueName,
        FieldName::VenueAddress,
        FieldName::Description,
        FieldName::Organizer,
        FieldName::ContactEmail,
        FieldName::ContactPhone,
        FieldName::TicketPrice,
        FieldName::Website,
        FieldName::RegistrationLink,
    ];

    /// Fields required for a text result to be accepted without escalation.
    pub const CRITICAL: [FieldName; 3] =
        [FieldName::EventName, FieldName::Date, FieldName::VenueName];

    /// Wire name of the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::EventName => "event_name",
            FieldName::Date => "date",
            FieldName::Time => "time",
            FieldName::VenueName => "venue_name",
            FieldName::VenueAddress => "venue_address",
            FieldName::Description => "description",
            FieldName::Organizer => "organizer",
            FieldName::ContactEmail => "contact_email",
            FieldName::ContactPhone => "contact_phone",
            FieldName::TicketPrice => "ticket_price",
            FieldName::Website => "website",
            FieldName::RegistrationLink => "registration_link",
        }
    }

    /// Look up a schema field by wire name.
    pub fn from_key(key: &str) -> Option<Self> {
        FieldName::ALL.into_iter().find(|f| f.as_str() == key)
    }

}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single extracted attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Extracted value, `None` when the attribute was not found.
    pub value: Option<String>,

    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,

    /// Provenance: a region label, a capability reference, or "vision".
    pub source: String,
}

impl Field {
    /// Create a populated field, clamping confidence to [0, 1].
    pub fn new(value: impl Into<String>, confidence: f32, source: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            confidence: clamp_confidence(confidence),
            source: source.into(),
        }
    }

    /// Whether the field carries a non-empty value.
    pub fn is_present(&self) -> bool {
        self.value
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty())
    }
}

/// The fixed event schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventFields {
    pub event_name: Field,
    pub date: Field,
    pub time: Field,
    pub venue_name: Field,
    pub venue_address: Field,
    pub description: Field,
    pub organizer: Field,
    pub contact_email: Field,
    pub contact_phone: Field,
    pub ticket_price: Field,
    pub website: Field,
    pub registration_link: Field,
}

impl EventFields {
    /// Get a field by name.
    pub fn get(&self, name: FieldName) -> &Field {
        match name {
            FieldName::EventName => &self.event_name,
            FieldName::Date => &self.date,
            FieldName::Time => &self.time,
            FieldName::VenueName => &self.venue_name,
            FieldName::VenueAddress => &self.venue_address,
            FieldName::Description => &self.description,
            FieldName::Organizer => &self.organizer,
            FieldName::ContactEmail => &self.contact_email,
            FieldName::ContactPhone => &self.contact_phone,
            FieldName::TicketPrice => &self.ticket_price,
            FieldName::Website => &self.website,
            FieldName::RegistrationLink => &self.registration_link,
        }
    }

    /// Get a mutable field by name.
    pub fn get_mut(&mut self, name: FieldName) -> &mut Field {
        match name {
            FieldName::EventName => &mut self.event_name,
            FieldName::Date => &mut self.date,
            FieldName::Time => &mut self.time,
            FieldName::VenueName => &mut self.venue_name,
            FieldName::VenueAddress => &mut self.venue_address,
            FieldName::Description => &mut self.description,
            FieldName::Organizer => &mut self.organizer,
            FieldName::ContactEmail => &mut self.contact_email,
            FieldName::ContactPhone => &mut self.contact_phone,
            FieldName::TicketPrice => &mut self.ticket_price,
            FieldName::Website => &mut self.website,
            FieldName::RegistrationLink => &mut self.registration_link,
        }
    }

    /// Replace a field.
    pub fn set(&mut self, name: FieldName, field: Field) {
        *self.get_mut(name) = field;
    }

    /// Iterate over all fields in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldName, &Field)> {
        FieldName::ALL.into_iter().map(move |name| (name, self.get(name)))
    }

    /// Fields with a non-null value.
    pub fn present(&self) -> impl Iterator<Item = (FieldName, &Field)> {
        self.iter().filter(|(_, field)| field.is_present())
    }

    /// Number of fields with a non-null value.
    pub fn present_count(&self) -> usize {
        self.present().count()
    }

    /// Mean confidence of the non-null fields, or `None` when all are null.
    ///
    /// Accumulated in `f64` so the result does not depend on field order.
    pub fn mean_confidence(&self) -> Option<f64> {
        let confidences: Vec<f64> = self
            .present()
            .map(|(_, f)| f64::from(f.confidence))
            .collect();
        if confidences.is_empty() {
            return None;
        }
        Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
    }

    /// Critical fields whose value is null.
    pub fn missing_critical(&self) -> Vec<FieldName> {
        FieldName::CRITICAL
            .into_iter()
            .filter(|name| !self.get(*name).is_present())
            .collect()
    }
}

/// An attribute outside the fixed schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraField {
    /// Attribute name as reported by the capability.
    pub key: String,

    /// Attribute value (any JSON).
    pub value: serde_json::Value,

    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,

    /// Provenance reference.
    pub source: String,
}

/// Clamp a confidence to [0, 1], mapping NaN to 0.
pub fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_name_round_trip() {
        for name in FieldName::ALL {
            assert_eq!(FieldName::from_key(name.as_str()), Some(name));
        }
        assert_eq!(FieldName::from_key("dress_code"), None);
    }

    #[test]
    fn test_blank_value_is_not_present() {
        let field = Field::new("   ", 0.9, "top");
        assert!(!field.is_present());
        assert!(!Field::default().is_present());
    }

    #[test]
    fn test_mean_confidence_ignores_null_fields() {
        let mut fields = EventFields::default();
        assert_eq!(fields.mean_confidence(), None);

        fields.set(FieldName::EventName, Field::new("Jazz Night", 0.9, "top"));
        fields.set(FieldName::Date, Field::new("2026-05-01", 0.5, "middle"));
        fields.time.confidence = 0.1;

        let mean = fields.mean_confidence().unwrap();
        assert!((mean - 0.7).abs() < 1e-6);
        assert_eq!(fields.present_count(), 2);
    }

    #[test]
    fn test_missing_critical() {
        let mut fields = EventFields::default();
        fields.set(FieldName::Date, Field::new("2026-05-01", 0.8, "top"));
        assert_eq!(
            fields.missing_critical(),
            vec![FieldName::EventName, FieldName::VenueName]
        );
    }

    #[test]
    fn test_serializes_all_fixed_keys() {
        let json = serde_json::to_value(EventFields::default()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), FieldName::ALL.len());
        assert!(obj["venue_name"]["value"].is_null());
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(Field::new("x", 1.7, "top").confidence, 1.0);
        assert_eq!(clamp_confidence(-0.2), 0.0);
        assert_eq!(clamp_confidence(f32::NAN), 0.0);
    }
}
