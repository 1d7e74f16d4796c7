use mikro_config::{RouterDescriptor, RouterRegistry};
use mikro_core::LookupError;

/// Picks the router a request targets.
#[derive(Debug, Clone, Copy)]
pub struct RouterSelector<'a> {
    routers: &'a RouterRegistry,
}

impl<'a> RouterSelector<'a> {
    pub fn new(routers: &'a RouterRegistry) -> Self {
        Self { routers }
    }

    /// The named router, or the default (first-loaded) one when no name is
    /// given. Registry failures are returned unchanged.
    pub fn resolve(&self, requested: Option<&str>) -> Result<&'a RouterDescriptor, LookupError> {
        match requested.map(str::trim) {
            None | Some("") => self.routers.default_router(),
            Some(name) => self.routers.lookup(name),
        }
    }
}
