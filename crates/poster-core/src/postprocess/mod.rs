//! Validation and normalization of extracted fields.

mod normalizer;
mod validator;

pub use normalizer::{
    Normalized, Normalizer, aggregate_confidence, normalize_date, normalize_email,
    normalize_phone, normalize_time, normalize_url, today_in,
};
pub use validator::{Rejection, Validation, Validator};
