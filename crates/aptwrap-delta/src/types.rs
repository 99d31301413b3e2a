use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Upgradable {
    pub name: String,
    pub installed: String,
    pub available: String,
}
