//! Page templates, compiled into the binary.

use anyhow::Context;
use chrono::NaiveDate;
use minijinja::Environment;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("project_card.html", include_str!("../templates/project_card.html")),
    ("home.html", include_str!("../templates/home.html")),
    ("projects.html", include_str!("../templates/projects.html")),
    ("project.html", include_str!("../templates/project.html")),
    ("about.html", include_str!("../templates/about.html")),
    ("contact.html", include_str!("../templates/contact.html")),
    ("admin.html", include_str!("../templates/admin.html")),
    ("error.html", include_str!("../templates/error.html")),
];

/// `2024-03-09` as `March 2024`; anything else passes through
fn month_year(value: String) -> String {
    NaiveDate::parse_from_str(&value, "%Y-%m-%d")
        .map(|date| date.format("%B %Y").to_string())
        .unwrap_or(value)
}

/// Build the template environment. `.html` templates are auto-escaped.
pub fn load() -> anyhow::Result<Environment<'static>> {
    let mut env = Environment::new();
    for &(name, source) in TEMPLATES {
        env.add_template(name, source)
            .with_context(|| format!("Failed to compile template {name}"))?;
    }
    env.add_filter("month_year", month_year);
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn test_month_year() {
        assert_eq!(month_year("2024-03-09".to_string()), "March 2024");
        assert_eq!(month_year("soon".to_string()), "soon");
    }

    #[test]
    fn test_templates_render_and_escape() {
        let env = load().unwrap();
        let html = env
            .get_template("error.html")
            .unwrap()
            .render(context! {
                settings => context! { site_title => "Oak <& Iron>" },
                heading => "Page not found",
                message => "Nothing here",
                year => 2024,
            })
            .unwrap();
        assert!(html.contains("Oak &lt;&amp; Iron&gt;"));
        assert!(html.contains("Page not found"));
    }
}
