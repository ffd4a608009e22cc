use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Verified caller identity. Lives for one request only; never cached across requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(String);

impl Subject {
    pub fn new<S: Into<String>>(s: S) -> Self { Subject(s.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_inner(self) -> String { self.0 }
}

impl Display for Subject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

impl AsRef<str> for Subject {
    fn as_ref(&self) -> &str { &self.0 }
}
