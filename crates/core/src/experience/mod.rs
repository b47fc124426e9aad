//! Learned per-domain strategy success counts.

mod store;

pub use store::{
    domain_of, normalize_domain, ExperienceError, ExperienceSnapshot, ExperienceStore,
};
