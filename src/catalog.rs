use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CatalogItem {
    pub value: &'static str,
    pub label: &'static str,
}

pub const COUNTRIES: &[CatalogItem] = &[
    CatalogItem { value: "US", label: "United States" },
    CatalogItem { value: "GB", label: "United Kingdom" },
    CatalogItem { value: "DE", label: "Germany" },
    CatalogItem { value: "FR", label: "France" },
    CatalogItem { value: "JP", label: "Japan" },
    CatalogItem { value: "CN", label: "China" },
    CatalogItem { value: "IN", label: "India" },
    CatalogItem { value: "CA", label: "Canada" },
];

pub const INDICATORS: &[CatalogItem] = &[
    CatalogItem { value: "GDP", label: "GDP Growth" },
    CatalogItem { value: "INFLATION", label: "Inflation Rate" },
    CatalogItem { value: "UNEMPLOYMENT", label: "Unemployment Rate" },
    CatalogItem { value: "INTEREST", label: "Interest Rate" },
    CatalogItem { value: "EXPORTS", label: "Export Volume" },
    CatalogItem { value: "IMPORTS", label: "Import Volume" },
];

/// Канонический код страны: название из справочника заменяется кодом
pub fn canonical_country(value: &str) -> &str {
    let value = value.trim();
    COUNTRIES
        .iter()
        .find(|c| c.label == value)
        .map(|c| c.value)
        .unwrap_or(value)
}

/// Совпадение стран по каноническому коду (код или название с любой стороны)
pub fn country_matches(stored: &str, requested: &str) -> bool {
    canonical_country(stored) == canonical_country(requested)
}
