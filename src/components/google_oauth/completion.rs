/// Page served to the login popup after a successful callback.
///
/// It hands the access token to the window that opened the popup, restricted
/// to the front-end origin, and then closes itself.
pub fn popup_page(access_token: &str, target_origin: &str) -> String {
    let payload = serde_json::json!({ "success": true, "token": access_token });

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Signed in</title></head>
<body>
<p>Signed in. You can close this window.</p>
<script>
  (function () {{
    var payload = {payload};
    if (window.opener) {{
      window.opener.postMessage(payload, {origin});
    }}
    window.close();
  }})();
</script>
</body>
</html>
"#,
        payload = script_literal(&payload.to_string()),
        origin = script_literal(&serde_json::Value::from(target_origin).to_string()),
    )
}

/// JSON is a valid script literal once `</` can no longer end the script block
fn script_literal(json: &str) -> String {
    json.replace("</", "<\\/")
}
