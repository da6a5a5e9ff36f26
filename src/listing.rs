use crate::error::ServerResult;
use chrono::{DateTime, Local};
use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// Stat results for one directory entry
pub struct EntryStat {
    pub size: u64,
    pub modified: SystemTime,
}

/// One row of a directory listing, computed transiently per request.
/// A failed stat keeps its error message so the listing can render a
/// sentinel instead of failing outright.
pub struct DirectoryEntry {
    pub name: String,
    pub is_dir: bool,
    pub is_image: bool,
    pub stat: Result<EntryStat, String>,
}

/// Extensions offered to the client-side gallery
const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "gif"];

/// Enumerate a directory, stat each entry and classify images.
/// Dot entries are excluded; entries are sorted directories-first.
pub fn scan_dir(dir: &Path) -> ServerResult<Vec<DirectoryEntry>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        let (is_dir, stat) = match entry.metadata() {
            Ok(meta) => (
                meta.is_dir(),
                Ok(EntryStat {
                    size: meta.len(),
                    modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                }),
            ),
            Err(e) => (false, Err(e.to_string())),
        };

        let is_image = !is_dir && is_image_name(&name);
        entries.push(DirectoryEntry {
            name,
            is_dir,
            is_image,
            stat,
        });
    }

    entries.sort_by(|a, b| {
        b.is_dir
            .cmp(&a.is_dir)
            .then_with(|| a.name.cmp(&b.name))
    });

    Ok(entries)
}

fn is_image_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|img| ext.eq_ignore_ascii_case(img))
        })
        .unwrap_or(false)
}

/// Format a byte count for humans: the literal count below 1024, then
/// repeated division by 1024 with one decimal place.
pub fn human_size(size: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

    if size < 1024 {
        return format!("{} Bytes", size);
    }

    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.1} {}", value, UNITS[unit])
}

/// Compute the "up" link for a listing: the request path with its final
/// segment removed. At the root the link targets the root itself.
pub fn parent_url(request_path: &str) -> String {
    let trimmed = request_path.trim_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }

    let segments: Vec<&str> = trimmed.split('/').collect();
    if segments.len() <= 1 {
        return "/".to_string();
    }

    format!("/{}/", segments[..segments.len() - 1].join("/"))
}

fn format_mtime(modified: SystemTime) -> String {
    let local: DateTime<Local> = modified.into();
    local.format("%Y-%m-%d %H:%M").to_string()
}

/// Render a directory listing as an HTML table with an up-link and a
/// click-to-view gallery for image entries.
pub fn render_listing(request_path: &str, entries: &[DirectoryEntry]) -> String {
    let display_path = if request_path.trim_matches('/').is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", request_path.trim_matches('/'))
    };

    let mut html = String::new();
    html.push_str("<!DOCTYPE html><html><head>");
    html.push_str(&format!("<title>Index of {}</title>", display_path));
    html.push_str("<style>body{font-family:sans-serif;max-width:800px;margin:0 auto;padding:20px;}");
    html.push_str("table{border-collapse:collapse;width:100%;}");
    html.push_str("td,th{text-align:left;padding:4px 12px;border-bottom:1px solid #ddd;}");
    html.push_str("a{text-decoration:none;color:#2980b9;}");
    html.push_str("#gallery img{max-width:100%;margin-top:12px;}</style>");
    html.push_str("<script>function showImage(src){");
    html.push_str("document.getElementById('gallery').innerHTML='<img src=\"'+src+'\" />';");
    html.push_str("return false;}</script>");
    html.push_str("</head><body>");
    html.push_str(&format!("<h1>Index of {}</h1>", display_path));

    // Exactly one up-link when not at root
    if display_path != "/" {
        html.push_str(&format!(
            "<p><a class=\"up\" href=\"{}\">[up]</a></p>",
            parent_url(request_path)
        ));
    }

    html.push_str("<table><tr><th>Name</th><th>Size</th><th>Modified</th><th></th></tr>");

    for entry in entries {
        let href = format!("{}{}", display_path, entry.name);
        let display_name = if entry.is_dir {
            format!("{}/", entry.name)
        } else {
            entry.name.clone()
        };

        let (size, modified) = match &entry.stat {
            Ok(stat) => {
                let size = if entry.is_dir {
                    "-".to_string()
                } else {
                    human_size(stat.size)
                };
                (size, format_mtime(stat.modified))
            }
            // Partial-failure tolerance: the error message stands in for
            // the size and the listing still renders
            Err(msg) => (msg.clone(), String::new()),
        };

        let gallery = if entry.is_image {
            format!(
                "<a href=\"#\" onclick=\"return showImage('{}')\">view</a>",
                href
            )
        } else {
            String::new()
        };

        html.push_str(&format!(
            "<tr><td><a href=\"{}\">{}</a></td><td>{}</td><td>{}</td><td>{}</td></tr>",
            href, display_name, size, modified, gallery
        ));
    }

    html.push_str("</table><div id=\"gallery\"></div></body></html>");
    html
}
