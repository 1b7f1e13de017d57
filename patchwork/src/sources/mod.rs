//! Some known upstream grids. Make sure you follow terms of usage of the particular
//! service.

pub mod hangzhou;

/// Attribution of an upstream tile service. Typically, this should be displayed
/// somewhere on the top of the map widget.
#[derive(Clone)]
pub struct Attribution {
    pub text: &'static str,
    pub url: &'static str,
}
