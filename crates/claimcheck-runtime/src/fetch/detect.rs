//! Format detection from URL and content type.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Csv,
    Json,
    Xlsx,
    Xls,
}

impl DatasetFormat {
    /// URL hints win over content type; unknown defaults to CSV.
    pub fn detect(url: &str, content_type: &str) -> Self {
        let url = url.to_lowercase();
        let content_type = content_type.to_lowercase();

        if url.contains(".csv") || content_type.contains("text/csv") {
            DatasetFormat::Csv
        } else if url.contains(".json") || content_type.contains("application/json") {
            DatasetFormat::Json
        } else if url.contains(".xlsx") || content_type.contains("spreadsheetml") {
            DatasetFormat::Xlsx
        } else if url.contains(".xls") || content_type.contains("ms-excel") {
            DatasetFormat::Xls
        } else {
            DatasetFormat::Csv
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetFormat::Csv => "csv",
            DatasetFormat::Json => "json",
            DatasetFormat::Xlsx => "xlsx",
            DatasetFormat::Xls => "xls",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Pdf,
    Html,
    Txt,
}

impl TextFormat {
    pub fn detect(url: &str, content_type: &str) -> Self {
        let url = url.to_lowercase();
        let content_type = content_type.to_lowercase();

        if url.contains(".pdf") || content_type.contains("application/pdf") {
            TextFormat::Pdf
        } else if url.contains(".htm") || content_type.contains("text/html") {
            TextFormat::Html
        } else {
            TextFormat::Txt
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TextFormat::Pdf => "pdf",
            TextFormat::Html => "html",
            TextFormat::Txt => "txt",
        }
    }
}
