use minijinja::value::Value;
use minijinja::Environment;
use pulldown_cmark::{html, Event, Options, Parser};
use tracing::error;

pub fn init_templates() -> Environment<'static> {
    let mut env = Environment::new();

    // Register built-in templates
    env.add_template("chat.html", include_str!("../../templates/chat.html"))
        .expect("Failed to add chat template");
    env.add_template("error.html", include_str!("../../templates/error.html"))
        .expect("Failed to add error template");

    // Add filters
    env.add_filter("json", |value: minijinja::value::Value| {
        serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string())
    });
    env.add_filter("markdown", markdown);

    env
}

pub fn render_template(env: &Environment, template_name: &str, context: minijinja::value::Value) -> String {
    match env.get_template(template_name) {
        Ok(tmpl) => match tmpl.render(context) {
            Ok(result) => result,
            Err(e) => {
                error!("Template render error: {}", e);
                render_error(env, &e.to_string())
            }
        },
        Err(e) => {
            error!("Template not found: {} ({})", template_name, e);
            format!("<h1>Template Not Found</h1><p>{}: {}</p>", template_name, e)
        }
    }
}

/// Renders an assistant reply. Raw HTML in the source is shown as text, since
/// replies quote LLM output and database errors.
fn markdown(text: &str) -> Value {
    let parser = Parser::new_ext(text, Options::ENABLE_TABLES).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut rendered = String::new();
    html::push_html(&mut rendered, parser);
    Value::from_safe_string(rendered)
}

fn render_error(env: &Environment, message: &str) -> String {
    env.get_template("error.html")
        .and_then(|tmpl| tmpl.render(minijinja::context! { message => message }))
        .unwrap_or_else(|_| "<h1>Template Error</h1>".to_string())
}
