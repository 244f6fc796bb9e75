//! Data models for the pastoral records API.
//!
//! This module contains the records exchanged with the API:
//!
//! - `Pastor`, `PastorForm`: pastor records and the flat edit form
//! - `Zone`, `Area`, `Parish`: the church hierarchy
//! - `UserProfile`, `Credentials`, `Registration`: administrator accounts

pub mod organization;
pub mod pastor;
pub mod user;

pub use organization::{Area, Hierarchy, Parish, Zone};
pub use pastor::{
    Child, EducationTraining, FamilyInfo, Pastor, PastorForm, ProfessionalInfo, SkillsGifts,
    TextOrList,
};
pub use user::{Credentials, LoginResponse, Registration, UserProfile};
