//! Fixed page bodies for the login surface. Template rendering proper lives
//! in the UI layer, outside this crate.

/// Interim body streamed on successful login while services bootstrap in
/// the background.
pub const INTERSTITIAL: &str = "<!DOCTYPE html>\n\
<html>\n\
<head><meta charset=\"utf-8\"><title>Setting up your account</title>\n\
<meta http-equiv=\"refresh\" content=\"2;url=/\"></head>\n\
<body>\n\
  <h1>Signing you in&hellip;</h1>\n\
  <p>Your encrypted mailbox is being prepared. This page refreshes on its own.</p>\n\
</body>\n\
</html>\n";

const UNAUTHORIZED_BODY: &str = "<!DOCTYPE html>\n\
<html><head><meta charset=\"utf-8\"><title>Unauthorized</title></head>\n\
<body><h1>Unauthorized</h1><p>Please <a href=\"/login\">log in</a>.</p></body></html>\n";

pub fn unauthorized_page() -> &'static str {
    UNAUTHORIZED_BODY
}

/// Login form, with an optional error banner.
pub fn login_page(error_msg: Option<&str>) -> String {
    let banner = match error_msg {
        Some(msg) => format!("<p class=\"error\">{}</p>\n", msg),
        None => String::new(),
    };
    format!(
        "<!DOCTYPE html>\n\
<html>\n\
<head><meta charset=\"utf-8\"><title>Log in</title></head>\n\
<body>\n\
  <h1>Log in</h1>\n\
  {banner}\
  <form method=\"post\" action=\"/login\">\n\
    <label>Username <input type=\"text\" name=\"username\" autofocus></label>\n\
    <label>Password <input type=\"password\" name=\"password\"></label>\n\
    <button type=\"submit\">Log in</button>\n\
  </form>\n\
</body>\n\
</html>\n"
    )
}
