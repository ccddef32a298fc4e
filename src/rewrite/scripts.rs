//! Scripts injected into upstream HTML.
//!
//! # Blocks
//! - early: right after `<head>`, before any upstream script runs. Sets
//!   bundler public paths, guards storage, patches navigation and network
//!   entry points, disables service workers.
//! - runtime: before `</head>`. `<base>`, history and attribute wrappers,
//!   anchor rewriting, entry-route bootstrap, session watcher.
//! - loader: overlay shown on the entry route.
//!
//! Every block reads one JSON config object; values are never spliced into
//! script text by hand.

use serde::Serialize;

use crate::config::SpaConfig;
use crate::routing::MountPoint;
use crate::session::Namespace;

const CONFIG_PLACEHOLDER: &str = "__GATEWAY_CONFIG__";

/// Values shared by all injected scripts.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptConfig<'a> {
    pub mount: &'a str,
    pub slot_param: &'a str,
    pub slot: u32,
    pub prefix: &'a str,
    pub upstream_host: &'a str,
    pub api_prefixes: &'a [String],
    pub entry_route: &'a str,
    pub authenticated_route: &'a str,
    pub session_cookie: &'a str,
    pub poll_interval_ms: u64,
    pub overlay_enabled: bool,
}

impl<'a> ScriptConfig<'a> {
    pub fn new(
        mount: &'a MountPoint,
        namespace: &'a Namespace,
        upstream_host: &'a str,
        api_prefixes: &'a [String],
        spa: &'a SpaConfig,
    ) -> Self {
        Self {
            mount: mount.path(),
            slot_param: mount.slot_param(),
            slot: namespace.slot().get(),
            prefix: namespace.prefix(),
            upstream_host,
            api_prefixes,
            entry_route: &spa.entry_route,
            authenticated_route: &spa.authenticated_route,
            session_cookie: &spa.session_cookie,
            poll_interval_ms: spa.poll_interval_ms,
            overlay_enabled: spa.overlay_enabled,
        }
    }
}

/// Serialize a value for use inside a `<script>` element.
///
/// `<`, `>` and `&` are escaped so no string in the document can close the
/// element or open a comment.
pub fn embed_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    Ok(out)
}

pub fn early_block(config: &ScriptConfig<'_>) -> Result<String, serde_json::Error> {
    let json = embed_json(config)?;
    Ok(format!(
        "<script data-gateway=\"early\">{}</script>",
        EARLY_SCRIPT.replace(CONFIG_PLACEHOLDER, &json)
    ))
}

pub fn runtime_block(config: &ScriptConfig<'_>) -> Result<String, serde_json::Error> {
    let json = embed_json(config)?;
    let base = html_attribute(&format!("{}/", config.mount));
    Ok(format!(
        "<base href=\"{}\"><script data-gateway=\"runtime\">{}</script>",
        base,
        RUNTIME_SCRIPT.replace(CONFIG_PLACEHOLDER, &json)
    ))
}

/// Empty when the overlay is disabled.
pub fn loader_block(config: &ScriptConfig<'_>) -> Result<String, serde_json::Error> {
    if !config.overlay_enabled {
        return Ok(String::new());
    }
    let json = embed_json(config)?;
    Ok(format!(
        "<style data-gateway=\"loader\">{}</style><script data-gateway=\"loader\">{}</script>",
        LOADER_STYLE,
        LOADER_SCRIPT.replace(CONFIG_PLACEHOLDER, &json)
    ))
}

fn html_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

const EARLY_SCRIPT: &str = r##"(function (C) {
  var M = C.mount;
  window.__GATEWAY__ = C;
  window.__webpack_public_path__ = M + "/";
  window.__vite_public_path__ = M + "/";
  window.__PUBLIC_PATH__ = M + "/";

  function memoryStorage() {
    var data = {};
    return {
      getItem: function (k) { return Object.prototype.hasOwnProperty.call(data, k) ? data[k] : null; },
      setItem: function (k, v) { data[k] = String(v); },
      removeItem: function (k) { delete data[k]; },
      clear: function () { data = {}; },
      key: function (i) { var keys = Object.keys(data); return i < keys.length ? keys[i] : null; },
      get length() { return Object.keys(data).length; }
    };
  }
  ["localStorage", "sessionStorage"].forEach(function (name) {
    try {
      var store = window[name];
      store.setItem("__gateway_probe__", "1");
      store.removeItem("__gateway_probe__");
    } catch (e) {
      try {
        Object.defineProperty(window, name, { value: memoryStorage(), configurable: true });
      } catch (ignored) {}
    }
  });

  function isApi(path) {
    if (/^\/v\d+(\/|$)/.test(path)) return true;
    return C.apiPrefixes.some(function (p) {
      p = p.replace(/\/+$/, "");
      return p !== "" && (path === p || path.indexOf(p + "/") === 0);
    });
  }
  function rewrite(raw) {
    if (raw === null || raw === undefined) return raw;
    if (typeof raw !== "string" && !(raw instanceof URL)) return raw;
    var u;
    try { u = new URL(String(raw), location.href); } catch (e) { return raw; }
    if (u.host.toLowerCase() !== C.upstreamHost && u.origin !== location.origin) return raw;
    var path = u.pathname;
    if (!(path === M || path.indexOf(M + "/") === 0)) path = M + path;
    var sub = path.slice(M.length) || "/";
    var search = u.search;
    if (!isApi(sub) && !new URLSearchParams(search).has(C.slotParam)) {
      search = (search ? search + "&" : "?") + encodeURIComponent(C.slotParam) + "=" + C.slot;
    }
    return path + search + u.hash;
  }
  window.__gatewayRewrite = rewrite;

  var nativeFetch = window.fetch;
  if (nativeFetch) {
    window.fetch = function (input, init) {
      if (typeof input === "string" || input instanceof URL) {
        input = rewrite(input);
      } else if (input && input.url) {
        var next = rewrite(input.url);
        if (next !== input.url) input = new Request(next, input);
      }
      return nativeFetch.call(this, input, init);
    };
  }

  var nativeXhrOpen = XMLHttpRequest.prototype.open;
  XMLHttpRequest.prototype.open = function (method, url) {
    var args = Array.prototype.slice.call(arguments);
    args[1] = rewrite(url);
    return nativeXhrOpen.apply(this, args);
  };

  ["assign", "replace"].forEach(function (fn) {
    try {
      var native = window.location[fn].bind(window.location);
      window.location[fn] = function (url) { return native(rewrite(url)); };
    } catch (e) {}
  });

  var nativeWindowOpen = window.open;
  window.open = function (url) {
    var args = Array.prototype.slice.call(arguments);
    if (url) args[0] = rewrite(url);
    return nativeWindowOpen.apply(window, args);
  };

  if (navigator.serviceWorker) {
    try {
      navigator.serviceWorker.register = function () {
        return Promise.reject(new Error("service workers are disabled"));
      };
      if (navigator.serviceWorker.getRegistrations) {
        navigator.serviceWorker.getRegistrations().then(function (regs) {
          regs.forEach(function (r) { r.unregister(); });
        }).catch(function () {});
      }
    } catch (e) {}
  }
})(__GATEWAY_CONFIG__);"##;

const RUNTIME_SCRIPT: &str = r##"(function (C) {
  var M = C.mount;
  var rewrite = window.__gatewayRewrite || function (u) { return u; };
  function notify() {
    try { window.dispatchEvent(new Event("gateway:navigate")); } catch (e) {}
  }

  ["pushState", "replaceState"].forEach(function (fn) {
    var native = history[fn];
    history[fn] = function (state, title, url) {
      if (url !== undefined && url !== null) url = rewrite(String(url));
      var result = native.call(history, state, title, url);
      notify();
      return result;
    };
  });

  var nativeSetAttribute = Element.prototype.setAttribute;
  Element.prototype.setAttribute = function (name, value) {
    var n = String(name).toLowerCase();
    if ((n === "href" || n === "src" || n === "action") && typeof value === "string" && value.charAt(0) !== "#") {
      value = rewrite(value);
    }
    return nativeSetAttribute.call(this, name, value);
  };

  document.addEventListener("click", function (event) {
    var el = event.target;
    while (el && el.tagName !== "A") el = el.parentElement;
    if (!el) return;
    var href = el.getAttribute("href");
    if (!href || href.charAt(0) === "#") return;
    var next = rewrite(href);
    if (next !== href) nativeSetAttribute.call(el, "href", next);
  }, true);

  function subPath() { return location.pathname.slice(M.length) || "/"; }
  function onEntryRoute() {
    var sub = subPath();
    return sub === "/" || sub === C.entryRoute;
  }

  if (subPath() === "/" && C.entryRoute && C.entryRoute !== "/") {
    history.replaceState(history.state, "", rewrite(C.entryRoute + location.search));
  }

  function hasSession() {
    var names = [C.prefix + C.sessionCookie, C.sessionCookie];
    return document.cookie.split(";").some(function (part) {
      return names.indexOf(part.split("=")[0].trim()) !== -1;
    });
  }
  var watcher = setInterval(function () {
    if (!hasSession()) return;
    clearInterval(watcher);
    if (onEntryRoute()) window.location.replace(rewrite(C.authenticatedRoute));
  }, C.pollIntervalMs);
})(__GATEWAY_CONFIG__);"##;

const LOADER_STYLE: &str = "#gateway-loader{position:fixed;inset:0;z-index:2147483647;display:flex;align-items:center;justify-content:center;background:#0b0d12;transition:opacity .2s ease}#gateway-loader.gateway-hidden{opacity:0;pointer-events:none}#gateway-loader .gateway-spinner{width:40px;height:40px;border:3px solid rgba(255,255,255,.2);border-top-color:#fff;border-radius:50%;animation:gateway-spin 1s linear infinite}@keyframes gateway-spin{to{transform:rotate(360deg)}}";

const LOADER_SCRIPT: &str = r##"(function (C) {
  var M = C.mount;
  function onEntryRoute() {
    var sub = location.pathname.slice(M.length) || "/";
    return sub === "/" || sub === C.entryRoute || sub.indexOf(C.entryRoute + "/") === 0;
  }
  function overlay() {
    var el = document.getElementById("gateway-loader");
    if (!el && document.body) {
      el = document.createElement("div");
      el.id = "gateway-loader";
      var spinner = document.createElement("div");
      spinner.className = "gateway-spinner";
      el.appendChild(spinner);
      document.body.appendChild(el);
    }
    return el;
  }
  function update() {
    var el = overlay();
    if (!el) return;
    if (onEntryRoute()) el.classList.remove("gateway-hidden");
    else el.classList.add("gateway-hidden");
  }
  ["popstate", "hashchange", "gateway:navigate"].forEach(function (name) {
    window.addEventListener(name, update);
  });
  document.addEventListener("DOMContentLoaded", update);
  setInterval(update, C.pollIntervalMs);
  update();
})(__GATEWAY_CONFIG__);"##;
