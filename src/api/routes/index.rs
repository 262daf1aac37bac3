use axum::response::Html;

const LANDING_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>SQL Exporter</title></head>
<body>
<h1>SQL Exporter</h1>
<p><a href="/metrics">Metrics</a></p>
<p><a href="/health">Health</a></p>
</body>
</html>
"#;

/// GET /
pub async fn landing_page() -> Html<&'static str> {
    Html(LANDING_PAGE)
}
