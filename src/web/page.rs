//! HTML 页面渲染

use crate::report::{self, EvidenceSummary, ReportRow};

/// 侧边栏展示的模型信息
#[derive(Debug, Clone)]
pub struct SiteInfo {
    pub standard_model: String,
    /// 自训练模型未加载时为 `None`
    pub custom_model: Option<String>,
    pub visual_cutoff: f32,
}

/// 结果页需要的数据
pub struct ResultView<'a> {
    pub id: u64,
    pub image_name: &'a str,
    pub rows: &'a [ReportRow],
    pub original_uri: &'a str,
    pub annotated_uri: &'a str,
}

const CSS: &str = r#"
:root {
  --accent-purple: #a855f7; --accent-pink: #ec4899; --accent-blue: #2563eb;
  --accent-red: #dc2626; --text-primary: #1f2937; --text-secondary: #6b7280;
  --border-color: #e5e7eb;
}
* { box-sizing: border-box; font-family: 'Inter', -apple-system, BlinkMacSystemFont, sans-serif; }
body { margin: 0; background: #ffffff; color: var(--text-primary); }
.layout { display: flex; min-height: 100vh; }
.sidebar { width: 280px; background: #faf5ff; border-right: 1px solid var(--border-color); padding: 1.5rem 1rem; }
.sidebar h3 { font-size: 0.95rem; letter-spacing: 1px; }
.sidebar .footer { text-align: center; color: var(--text-secondary); font-size: 0.85rem; line-height: 2; }
.main { flex: 1; padding: 1rem 2rem 3rem; }
.header-container { background: linear-gradient(135deg, #a855f7 0%, #ec4899 100%); padding: 1.2rem 1.5rem;
  border-radius: 12px; margin-bottom: 1rem; text-align: center; color: #fff;
  box-shadow: 0 8px 24px rgba(168, 85, 247, 0.2); }
.header-title { margin: 0; letter-spacing: 3px; font-size: 1.8rem; }
.header-subtitle { margin: 0.3rem 0 0; letter-spacing: 2px; font-size: 0.85rem; opacity: 0.9; }
.header-badge { display: inline-block; margin: 0.8rem 0.3rem 0; padding: 0.25rem 0.8rem; border-radius: 999px;
  background: rgba(255, 255, 255, 0.2); font-size: 0.75rem; letter-spacing: 1px; }
.feature-card, .info-card, .results-container { background: #fff; border: 1px solid var(--border-color);
  border-radius: 12px; padding: 1rem 1.2rem; margin-bottom: 1rem; box-shadow: 0 2px 8px rgba(0, 0, 0, 0.04); }
.feature-card h4 { margin-top: 0; color: var(--accent-purple); }
.info-card h3, .section-title { color: var(--accent-blue); letter-spacing: 2px; }
.stats, .metrics { display: grid; gap: 1rem; margin-bottom: 1.5rem; }
.stats { grid-template-columns: repeat(3, 1fr); }
.metrics { grid-template-columns: repeat(4, 1fr); }
.stat-box, .metric { border: 1px solid var(--border-color); border-radius: 12px; padding: 1rem; text-align: center; }
.stat-icon { font-size: 1.8rem; }
.stat-number, .metric-value { font-size: 1.8rem; font-weight: 700; margin: 0.3rem 0; color: var(--accent-purple); }
.stat-label, .metric-label { margin: 0; color: var(--text-secondary); font-size: 0.8rem; letter-spacing: 1px; text-transform: uppercase; }
.metric-delta { font-size: 0.8rem; color: #16a34a; }
.metric-delta.critical { color: var(--accent-red); font-weight: 600; }
.upload-form { display: flex; gap: 1rem; align-items: center; margin-bottom: 1rem; }
.upload-form button, .download-btn { background: linear-gradient(135deg, #a855f7 0%, #ec4899 100%); color: #fff;
  border: none; border-radius: 8px; padding: 0.7rem 1.4rem; font-weight: 600; letter-spacing: 1px;
  cursor: pointer; text-decoration: none; display: inline-block; }
.columns { display: grid; grid-template-columns: 1fr 1fr; gap: 1rem; }
.result-header { margin: 0 0 0.6rem; color: var(--accent-purple); letter-spacing: 2px; font-size: 1rem; }
.image-container img { width: 100%; border-radius: 8px; border: 1px solid var(--border-color); }
.success-message { background: #dcfce7; color: #166534; border-radius: 8px; padding: 0.8rem 1rem; margin: 1rem 0; font-weight: 600; }
.notice { background: #eff6ff; color: #1e40af; border-radius: 8px; padding: 0.8rem 1rem; margin: 1rem 0; }
.error-message { background: #fee2e2; color: #991b1b; border-radius: 8px; padding: 0.8rem 1rem; margin: 1rem 0; font-weight: 600; }
.evidence-badge { display: inline-block; margin: 0.25rem; padding: 0.35rem 0.8rem; border-radius: 999px;
  font-size: 0.85rem; font-weight: 600; color: #fff; }
.badge-weapon { background: var(--accent-red); animation: pulse 1.5s infinite; }
.badge-person { background: #0891b2; }
.badge-digital { background: #3b82f6; }
.badge-general { background: #ca8a04; }
@keyframes pulse { 0%, 100% { opacity: 1; } 50% { opacity: 0.7; } }
table { width: 100%; border-collapse: collapse; margin-bottom: 1.5rem; }
th, td { text-align: left; padding: 0.5rem 0.8rem; border-bottom: 1px solid var(--border-color); }
th { background: #faf5ff; color: var(--accent-purple); font-size: 0.85rem; letter-spacing: 1px; }
.downloads { display: flex; gap: 1rem; }
"#;

/// 转义 HTML 特殊字符
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

/// 证据标签的样式类
pub fn badge_class(label: &str) -> &'static str {
    if label.contains("Gun") || label.contains("Knife") {
        "badge-weapon"
    } else if label.contains("Person") {
        "badge-person"
    } else if label.contains("Phone") || label.contains("Laptop") {
        "badge-digital"
    } else {
        "badge-general"
    }
}

fn percent(value: f32) -> String {
    format!("{:.0}%", value as f64 * 100.0)
}

fn layout(site: &SiteInfo, content: &str) -> String {
    let custom = match &site.custom_model {
        Some(name) => escape_html(name),
        None => "not loaded (gun/blood detection disabled)".to_string(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Crime Scene Evidence Analyzer</title>
<style>{css}</style>
</head>
<body>
<div class="layout">
<aside class="sidebar">
  <h3>📋 SYSTEM INFORMATION</h3>
  <div class="feature-card">
    <h4>🎯 DETECTION CAPABILITIES</h4>
    <ul>
      <li>Persons &amp; Suspects</li>
      <li>Weapons (Guns, Knives)</li>
      <li>Blood Stains</li>
      <li>Digital Evidence</li>
      <li>Personal Items</li>
      <li>Containers &amp; Objects</li>
    </ul>
  </div>
  <div class="feature-card">
    <h4>⚙️ AI CONFIGURATION</h4>
    <p>
      <strong>Standard Model:</strong> {standard}<br>
      <strong>Custom Model:</strong> {custom}<br>
      <strong>Threshold:</strong> {threshold} Confidence
    </p>
  </div>
  <div class="footer">
    <p>🔒 SECURE EVIDENCE PROCESSING</p>
    <p>📊 DETAILED REPORTING</p>
  </div>
</aside>
<main class="main">
  <div class="header-container">
    <h1 class="header-title">🔍 CRIME SCENE ANALYZER</h1>
    <p class="header-subtitle">AI-POWERED FORENSIC EVIDENCE DETECTION SYSTEM</p>
    <span class="header-badge">🎯 DUAL AI MODELS</span>
    <span class="header-badge">🔒 SECURE PROCESSING</span>
  </div>
  <div class="stats">
    <div class="stat-box"><div class="stat-icon">🤖</div><p class="stat-number">{models}</p><p class="stat-label">AI Models</p></div>
    <div class="stat-box"><div class="stat-icon">🎯</div><p class="stat-number">{types}+</p><p class="stat-label">Evidence Types</p></div>
    <div class="stat-box"><div class="stat-icon">⚡</div><p class="stat-number">{threshold}</p><p class="stat-label">Min Confidence</p></div>
  </div>
  <div class="info-card">
    <h3>📤 UPLOAD CRIME SCENE IMAGE</h3>
    <p>Upload a crime scene photograph for AI-powered evidence detection and analysis.
       Supported formats: <strong>JPG, JPEG, PNG</strong></p>
    <form class="upload-form" action="/analyze" method="post" enctype="multipart/form-data">
      <input type="file" name="file" accept=".jpg,.jpeg,.png,image/jpeg,image/png" required>
      <button type="submit">🔍 ANALYZE EVIDENCE</button>
    </form>
  </div>
  {content}
</main>
</div>
</body>
</html>"#,
        css = CSS,
        standard = escape_html(&site.standard_model),
        custom = custom,
        threshold = percent(site.visual_cutoff),
        models = if site.custom_model.is_some() { 2 } else { 1 },
        types = crate::ensemble::STANDARD_CLASSES.len() + crate::ensemble::CUSTOM_CLASSES.len(),
        content = content,
    )
}

/// 首页: 上传表单 + 使用说明
pub fn render_index(site: &SiteInfo) -> String {
    let content = format!(
        r#"<div class="info-card">
    <h3>📖 HOW TO USE</h3>
    <ol>
      <li><strong>Upload Image:</strong> Choose a crime scene photograph with the picker above</li>
      <li><strong>Analyze:</strong> Click "ANALYZE EVIDENCE" to run both detection models</li>
      <li><strong>Review Results:</strong> Inspect detected evidence, confidence scores and annotations</li>
      <li><strong>Download Reports:</strong> Export the full CSV report and the annotated image</li>
    </ol>
  </div>
  <div class="info-card">
    <h3>⚠️ IMPORTANT NOTES</h3>
    <ul>
      <li>Results should be verified by forensic professionals</li>
      <li>Minimum confidence threshold is set to {threshold} for visualization</li>
      <li>All detections are logged regardless of confidence level</li>
      <li>Weapon detections are highlighted as critical</li>
    </ul>
  </div>"#,
        threshold = percent(site.visual_cutoff),
    );
    layout(site, &content)
}

/// 分析结果页
pub fn render_result(site: &SiteInfo, view: &ResultView<'_>) -> String {
    let mut content = format!(
        r#"<div class="success-message">✅ ANALYSIS COMPLETE! {name} has been processed by the ensemble.</div>
  <div class="columns">
    <div class="results-container">
      <h3 class="result-header">📸 ORIGINAL IMAGE</h3>
      <div class="image-container"><img src="{original}" alt="original"></div>
    </div>
    <div class="results-container">
      <h3 class="result-header">🎯 ANALYSIS RESULTS</h3>
      <div class="image-container"><img src="{annotated}" alt="annotated"></div>
    </div>
  </div>
  <div class="results-container"><h3 class="result-header">📊 EVIDENCE SUMMARY</h3></div>
"#,
        name = escape_html(view.image_name),
        original = view.original_uri,
        annotated = view.annotated_uri,
    );

    if view.rows.is_empty() {
        content.push_str(r#"<div class="notice">ℹ️ No evidence detected in this image.</div>"#);
        return layout(site, &content);
    }

    let Some(summary) = EvidenceSummary::from_rows(view.rows, site.visual_cutoff) else {
        content.push_str(
            r#"<div class="notice">ℹ️ No high-confidence evidence detected in this image.</div>"#,
        );
        return layout(site, &content);
    };

    let (weapon_delta, weapon_class) = if summary.weapons > 0 {
        ("⚠️ Critical", "metric-delta critical")
    } else {
        ("✅ None", "metric-delta")
    };
    content.push_str(&format!(
        r#"<div class="metrics">
    <div class="metric"><p class="metric-label">Total Evidence</p><p class="metric-value">{total}</p><span class="metric-delta">High Confidence</span></div>
    <div class="metric"><p class="metric-label">Weapons Detected</p><p class="metric-value">{weapons}</p><span class="{weapon_class}">{weapon_delta}</span></div>
    <div class="metric"><p class="metric-label">Persons Identified</p><p class="metric-value">{persons}</p></div>
    <div class="metric"><p class="metric-label">Avg Confidence</p><p class="metric-value">{avg:.1}%</p></div>
  </div>
  <h4 class="section-title">🏷️ DETECTED EVIDENCE TYPES</h4>
  <div class="badges">"#,
        total = summary.total,
        weapons = summary.weapons,
        persons = summary.persons,
        avg = summary.avg_confidence as f64 * 100.0,
    ));

    let high: Vec<&ReportRow> = report::high_confidence(view.rows, site.visual_cutoff).collect();
    for row in &high {
        content.push_str(&format!(
            r#"<span class="evidence-badge {}">{} ({})</span>"#,
            badge_class(&row.evidence_type),
            escape_html(&row.evidence_type),
            row.confidence_text,
        ));
    }

    content.push_str(
        r#"</div>
  <h4 class="section-title">📋 DETAILED EVIDENCE REPORT</h4>
  <table>
    <thead><tr><th>Evidence Type</th><th>Confidence</th><th>Detection Model</th><th>Visualized</th></tr></thead>
    <tbody>"#,
    );
    for row in &high {
        content.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&row.evidence_type),
            row.confidence_text,
            row.model_source.as_str(),
            if row.visualized { "YES" } else { "NO" },
        ));
    }
    content.push_str(&format!(
        r#"</tbody>
  </table>
  <div class="downloads">
    <a class="download-btn" href="/reports/{id}/csv">📥 DOWNLOAD FULL REPORT (CSV)</a>
    <a class="download-btn" href="/reports/{id}/image">🖼️ DOWNLOAD ANNOTATED IMAGE</a>
  </div>"#,
        id = view.id,
    ));

    layout(site, &content)
}

/// 错误提示页 (不依赖运行状态)
pub fn render_error(status: u16, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Crime Scene Evidence Analyzer - Error {status}</title>
<style>{css}</style>
</head>
<body>
<main class="main">
  <div class="header-container">
    <h1 class="header-title">🔍 CRIME SCENE ANALYZER</h1>
  </div>
  <div class="error-message">❌ {message}</div>
  <a class="download-btn" href="/">⬅ BACK TO UPLOAD</a>
</main>
</body>
</html>"#,
        status = status,
        css = CSS,
        message = escape_html(message),
    )
}
