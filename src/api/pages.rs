//! Server-rendered HTML. Every interpolated value goes through [`escape`].

use std::fmt::Write;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};

use crate::catalog::{DirectoryListing, DirectorySummary};
use crate::storage::Link;

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{} | linkdrop</title>\n</head>\n<body>\n<main>\n{}\n</main>\n</body>\n</html>\n",
        escape(title),
        body
    )
}

fn admin_nav() -> &'static str {
    "<nav><a href=\"/admin/home\">Upload links</a> | <a href=\"/admin/files\">Files</a> | \
     <a href=\"/logout\">Log out</a></nav>"
}

fn timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Landing page with whichever login form the deployment uses.
pub fn home(google: bool, incorrect: bool) -> String {
    let mut body = String::from("<h1>linkdrop</h1>\n");
    if incorrect {
        body.push_str("<p class=\"error\">Incorrect username or password.</p>\n");
    }
    if google {
        body.push_str("<p><a href=\"/login\">Sign in with Google</a></p>\n");
    } else {
        body.push_str(
            "<form method=\"post\" action=\"/login\">\n\
             <label>Username <input name=\"username\" autocomplete=\"username\" required></label>\n\
             <label>Password <input name=\"password\" type=\"password\" \
             autocomplete=\"current-password\" required></label>\n\
             <button type=\"submit\">Log in</button>\n</form>\n",
        );
    }
    layout("Home", &body)
}

pub fn upload_form(token: &str, allowed_extensions: &[String], max_file_size: u64) -> String {
    let accept = allowed_extensions.join(",");
    let body = format!(
        "<h1>Upload a file</h1>\n\
         <form method=\"post\" action=\"/upload/{}\" enctype=\"multipart/form-data\">\n\
         <input type=\"file\" name=\"file\" accept=\"{}\" required>\n\
         <button type=\"submit\">Upload</button>\n</form>\n\
         <p>Allowed: {}. Maximum size: {} bytes.</p>\n",
        escape(token),
        escape(&accept),
        escape(&accept),
        max_file_size
    );
    layout("Upload", &body)
}

pub fn uploaded() -> String {
    layout(
        "Upload complete",
        "<h1>Upload complete</h1>\n<p>Your file was received.</p>",
    )
}

pub fn upload_failed() -> String {
    layout(
        "Upload failed",
        "<h1>Upload failed</h1>\n<p>The file could not be stored. Check its type and size and try again.</p>",
    )
}

pub fn download_listing(token: &str, listing: &DirectoryListing) -> String {
    let mut body = format!("<h1>{}</h1>\n<ul>\n", escape(&listing.name));
    for file in &listing.files {
        let _ = writeln!(
            body,
            "<li><a href=\"/download/{}/{}\">{}</a> ({} bytes)</li>",
            escape(token),
            escape(&file.name),
            escape(&file.display_name),
            file.size
        );
    }
    body.push_str("</ul>\n");
    if listing.files.is_empty() {
        body.push_str("<p>This folder is empty.</p>\n");
    }
    layout("Download", &body)
}

fn link_table(links: &[Link], base_url: &str, deactivate_action: &str) -> String {
    if links.is_empty() {
        return "<p>No active links.</p>\n".to_string();
    }
    let mut out = String::from(
        "<table>\n<tr><th>Directory</th><th>URL</th><th>Uses left</th><th>Expires</th><th></th></tr>\n",
    );
    for link in links {
        let url = format!("{base_url}{}", link.url);
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td><a href=\"{url}\">{url}</a></td><td>{}</td><td>{}</td>\
             <td><form method=\"post\" action=\"{}\">\
             <input type=\"hidden\" name=\"token\" value=\"{}\">\
             <button type=\"submit\">Deactivate</button></form></td></tr>",
            escape(&link.directory),
            link.remaining_uses,
            timestamp(Some(link.expires_at)),
            escape(deactivate_action),
            escape(&link.token),
            url = escape(&url),
        );
    }
    out.push_str("</table>\n");
    out
}

const LINK_FIELDS: &str = "<label>Expires in <input name=\"expiresIn\" value=\"24h\" required></label>\n\
     <label>Uses <input name=\"uses\" type=\"number\" min=\"1\" value=\"1\" required></label>\n";

pub fn admin_home(links: &[Link], base_url: &str) -> String {
    let mut body = format!("{}\n<h1>Upload links</h1>\n", admin_nav());
    let _ = write!(
        body,
        "<form method=\"post\" action=\"/admin/links/new\">\n\
         <label>Directory <input name=\"directory\" required></label>\n{LINK_FIELDS}\
         <button type=\"submit\">Create upload link</button>\n</form>\n"
    );
    body.push_str(&link_table(links, base_url, "/admin/links/deactivate"));
    layout("Upload links", &body)
}

pub fn admin_directories(directories: &[DirectorySummary]) -> String {
    let mut body = format!("{}\n<h1>Directories</h1>\n", admin_nav());
    if directories.is_empty() {
        body.push_str("<p>No directories yet.</p>\n");
    } else {
        body.push_str(
            "<table>\n<tr><th>Name</th><th>Files</th><th>Size</th><th>Modified</th></tr>\n",
        );
        for dir in directories {
            let _ = writeln!(
                body,
                "<tr><td><a href=\"/admin/files/{name}\">{name}</a></td><td>{}</td><td>{}</td><td>{}</td></tr>",
                dir.file_count,
                dir.total_size,
                timestamp(dir.last_modified),
                name = escape(&dir.name),
            );
        }
        body.push_str("</table>\n");
    }
    layout("Directories", &body)
}

pub fn admin_directory(listing: &DirectoryListing, links: &[Link], base_url: &str) -> String {
    let name = escape(&listing.name);
    let mut body = format!(
        "{}\n<h1>{name}</h1>\n<p>{} files, {} bytes</p>\n",
        admin_nav(),
        listing.file_count,
        listing.size
    );

    body.push_str("<table>\n<tr><th>Name</th><th>Size</th><th>Modified</th></tr>\n");
    for file in &listing.files {
        let _ = writeln!(
            body,
            "<tr><td><a href=\"/admin/files/{name}/download/{}\">{}</a></td><td>{}</td><td>{}</td></tr>",
            escape(&file.name),
            escape(&file.display_name),
            file.size,
            timestamp(file.last_modified),
        );
    }
    body.push_str("</table>\n");

    let _ = write!(
        body,
        "<h2>Upload</h2>\n\
         <form method=\"post\" action=\"/admin/files/{name}/upload\" enctype=\"multipart/form-data\">\n\
         <input type=\"file\" name=\"file\" required>\n<button type=\"submit\">Upload</button>\n</form>\n\
         <h2>Share</h2>\n\
         <form method=\"post\" action=\"/admin/files/{name}/share\">\n{LINK_FIELDS}\
         <button type=\"submit\">Create download link</button>\n</form>\n"
    );
    body.push_str(&link_table(
        links,
        base_url,
        &format!("/admin/files/{}/unshare", listing.name),
    ));
    layout(&listing.name, &body)
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let title = status.canonical_reason().unwrap_or("Error");
    let body = format!(
        "<h1>{}</h1>\n<p>{}</p>\n<p><a href=\"/\">Home</a></p>",
        escape(title),
        escape(message)
    );
    layout(title, &body)
}
