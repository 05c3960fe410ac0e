//! AR launch links
//!
//! Android opens Scene Viewer through an intent URL, iOS opens the USDZ
//! directly in Quick Look, and the universal link is a self-contained HTML
//! document that picks one of the two from the user agent.

use shared::{ArLinks, LaunchDecision, Platform};

use crate::config::ViewerSettings;

const SCENE_VIEWER: &str = "intent://arvr.google.com/scene-viewer/1.0";
const SCENE_VIEWER_INTENT: &str =
    "#Intent;scheme=https;package=com.google.android.googlequicksearchbox;end;";
const QR_SERVICE: &str = "https://api.qrserver.com/v1/create-qr-code/";

pub const UNSUPPORTED_NOTICE: &str = "AR is only supported on Android and iOS devices.";

/// Scene Viewer intent for a GLB, forced into AR-only mode
pub fn android_link(glb_url: &str) -> String {
    format!("{SCENE_VIEWER}?file={glb_url}&mode=ar_only{SCENE_VIEWER_INTENT}")
}

/// All links for a published artifact
pub fn generate(glb_url: Option<&str>, usdz_url: Option<&str>, config_hash: &str) -> ArLinks {
    ArLinks {
        android: glb_url.map(android_link),
        ios: usdz_url.map(String::from),
        universal: universal_link(glb_url.unwrap_or_default(), usdz_url, config_hash),
        config_hash: config_hash.to_string(),
    }
}

/// Platform from a user agent string
pub fn detect_platform(user_agent: &str) -> Platform {
    let ua = user_agent.to_ascii_lowercase();
    if ["iphone", "ipad", "ipod"].iter().any(|s| ua.contains(s)) {
        Platform::Ios
    } else if ua.contains("android") {
        Platform::Android
    } else {
        Platform::Unsupported
    }
}

/// Which link a device should open. iOS needs the USDZ, Android the GLB;
/// anything else gets a notice and no link.
pub fn resolve_launch(user_agent: &str, glb_url: Option<&str>, usdz_url: Option<&str>) -> LaunchDecision {
    let platform = detect_platform(user_agent);
    let url = match platform {
        Platform::Ios => usdz_url.map(String::from),
        Platform::Android => glb_url.map(android_link),
        Platform::Unsupported => None,
    };
    let notice = match (&platform, &url) {
        (_, Some(_)) => None,
        (Platform::Unsupported, None) => Some(UNSUPPORTED_NOTICE.to_string()),
        (_, None) => Some("No AR model available for this device.".to_string()),
    };
    LaunchDecision {
        platform,
        url,
        notice,
    }
}

/// `data:` URL of the universal launcher document
pub fn universal_link(glb_url: &str, usdz_url: Option<&str>, config_hash: &str) -> String {
    let html = universal_document(glb_url, usdz_url, config_hash);
    format!("data:text/html;charset=utf-8,{}", urlencoding::encode(&html))
}

/// QR image URL for any link
pub fn qr_code_url(link: &str) -> String {
    format!("{QR_SERVICE}?size=200x200&data={}", urlencoding::encode(link))
}

/// Artifact URLs the AR viewer page derives from a configuration hash
pub fn viewer_urls(config_hash: &str, viewer: &ViewerSettings) -> (String, String) {
    (
        format!("{}/{}.glb", viewer.glb_base_url.trim_end_matches('/'), config_hash),
        format!("{}/{}.usdz", viewer.usdz_base_url.trim_end_matches('/'), config_hash),
    )
}

/// Self-contained launcher: detects the platform client-side, offers the
/// matching AR link, a GLB download fallback and shows the hash.
pub fn universal_document(glb_url: &str, usdz_url: Option<&str>, config_hash: &str) -> String {
    let glb_attr = escape_html(glb_url);
    let glb_js = escape_js(glb_url);
    let usdz_js = escape_js(usdz_url.unwrap_or_default());
    let hash_block = if config_hash.is_empty() {
        String::new()
    } else {
        format!(
            "<div class=\"config-hash\">Config: {}</div>",
            escape_html(config_hash)
        )
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>View in AR - Vehicle Configuration</title>
<style>
body {{ font-family: -apple-system, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; min-height: 100vh; display: flex; align-items: center; justify-content: center; background: #f1f2f6; }}
.container {{ background: white; border-radius: 20px; padding: 40px; text-align: center; max-width: 400px; width: 100%; }}
.ar-button {{ display: inline-block; background: #2980b9; color: white; padding: 15px 30px; border-radius: 25px; text-decoration: none; margin: 10px; }}
.fallback {{ margin-top: 20px; font-size: 14px; }}
.config-hash {{ font-family: monospace; font-size: 12px; margin-top: 10px; }}
</style>
</head>
<body>
<div class="container">
<h1>View in AR</h1>
<p>Experience your vehicle configuration in augmented reality</p>
<div id="ar-buttons"></div>
<div class="fallback">
<p>If AR doesn't open automatically, try:</p>
<a href="{glb_attr}" class="ar-button" download>Download GLB File</a>
</div>
{hash_block}
</div>
<script>
(function() {{
  var glbUrl = '{glb_js}';
  var usdzUrl = '{usdz_js}';
  var container = document.getElementById('ar-buttons');
  var ua = navigator.userAgent || navigator.vendor || window.opera;
  var link = document.createElement('a');
  link.className = 'ar-button';
  if (/iPhone|iPad|iPod/i.test(ua) && usdzUrl) {{
    link.href = usdzUrl;
    link.rel = 'ar';
    link.textContent = 'View in AR (iOS)';
    container.appendChild(link);
    window.location.href = usdzUrl;
  }} else if (/android/i.test(ua) && glbUrl) {{
    link.href = '{SCENE_VIEWER}?file=' + glbUrl + '&mode=ar_only{SCENE_VIEWER_INTENT}';
    link.textContent = 'View in AR (Android)';
    container.appendChild(link);
    window.location.href = link.href;
  }} else {{
    var p = document.createElement('p');
    p.textContent = '{UNSUPPORTED_NOTICE}';
    container.appendChild(p);
  }}
}})();
</script>
</body>
</html>"#
    )
}

/// AR viewer page for `/ar?hash=…`
pub fn viewer_page_html(config_hash: &str, viewer: &ViewerSettings) -> String {
    let (glb, usdz) = viewer_urls(config_hash, viewer);
    universal_document(&glb, Some(&usdz), config_hash)
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn escape_js(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('<', "\\x3c")
        .replace('\n', "\\n")
}
