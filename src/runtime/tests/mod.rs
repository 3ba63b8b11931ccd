//! Tests for the suspend/resume controller
//!
//! Organized by feature area

mod helpers;
