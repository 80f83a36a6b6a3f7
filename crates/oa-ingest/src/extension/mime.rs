//! MIME type to filename extension table

/// Map a MIME type to the extension a downloaded file should carry.
///
/// Parameters such as `; charset=utf-8` are ignored and matching is
/// case-insensitive.
pub fn extension_for_mime(content_type: &str) -> Option<&'static str> {
    let essence = match content_type.parse::<::mime::Mime>() {
        Ok(parsed) => parsed.essence_str().to_ascii_lowercase(),
        Err(_) => content_type.split(';').next()?.trim().to_ascii_lowercase(),
    };

    let ext = match essence.as_str() {
        "text/csv" | "application/csv" => ".csv",
        "text/plain" => ".txt",
        "text/html" => ".html",
        "text/xml" | "application/xml" => ".xml",
        "application/json" => ".json",
        "application/geo+json" | "application/vnd.geo+json" => ".geojson",
        "application/vnd.google-earth.kml+xml" => ".kml",
        "application/vnd.google-earth.kmz" => ".kmz",
        // Some servers label zips as x-zip-compressed
        "application/zip" | "application/x-zip-compressed" | "application/x-zip" => ".zip",
        "application/gzip" | "application/x-gzip" => ".gz",
        "application/x-tar" => ".tar",
        "application/x-bzip2" => ".bz2",
        "application/x-7z-compressed" => ".7z",
        "application/vnd.rar" | "application/x-rar-compressed" => ".rar",
        "application/pdf" => ".pdf",
        "application/vnd.ms-excel" => ".xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => ".xlsx",
        "application/x-dbf" | "application/dbf" => ".dbf",
        "application/vnd.sqlite3" | "application/x-sqlite3" => ".sqlite",
        "application/octet-stream" => ".bin",
        _ => return None,
    };

    Some(ext)
}
