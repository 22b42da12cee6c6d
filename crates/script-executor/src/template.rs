//! Template expansion for bootstrap documents and install scripts
//!
//! Bootstrap documents see the instance metadata as `ds.meta_data`, the way
//! cloud-init exposes it to jinja templates. Install and uninstall scripts
//! see `bundle_download_path`.

use crate::error::ExecError;
use serde::Serialize;
use tera::{Context, Tera};

#[derive(Serialize)]
struct MetaData<'a> {
    hostname: &'a str,
    local_hostname: &'a str,
}

#[derive(Serialize)]
struct DataSource<'a> {
    meta_data: MetaData<'a>,
}

fn is_template(text: &str) -> bool {
    text.contains("{{") || text.contains("{%")
}

fn render(text: &str, context: &Context) -> Result<String, ExecError> {
    // Plain scripts may contain sequences such as `${#arr[@]}` that tera
    // would read as comment openers
    if !is_template(text) {
        return Ok(text.to_string());
    }
    Ok(Tera::one_off(text, context, false)?)
}

/// Expand a bootstrap document for `hostname`
pub fn render_bootstrap(document: &str, hostname: &str) -> Result<String, ExecError> {
    let mut context = Context::new();
    context.insert(
        "ds",
        &DataSource {
            meta_data: MetaData {
                hostname,
                local_hostname: hostname,
            },
        },
    );
    render(document, &context)
}

/// Expand an install or uninstall script
pub fn render_script(script: &str, bundle_download_path: &str) -> Result<String, ExecError> {
    let mut context = Context::new();
    context.insert("bundle_download_path", bundle_download_path);
    render(script, &context)
}
