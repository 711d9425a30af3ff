use super::AppError;

/// The operator's session. Every ledger operation is scoped to its route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    route: Option<String>,
}

impl Session {
    /// Blank or whitespace-only route names count as no route.
    pub fn new(route: Option<String>) -> Self {
        let route = route
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        Self { route }
    }

    pub fn for_route(route: impl Into<String>) -> Self {
        Self::new(Some(route.into()))
    }

    /// The active route, or a configuration error if there is none.
    pub fn route(&self) -> Result<&str, AppError> {
        self.route.as_deref().ok_or_else(|| {
            AppError::Configuration("no active route, please log in to a route again".into())
        })
    }
}
