use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Request, RequestInit, Response, Window};

use drawdeck_shared::{
    ApiError, Credentials, DiagramRecord, RenameDiagramRequest, SaveDiagramRequest,
    SaveDiagramResponse, TokenResponse,
};

/// Outcome of a REST call: HTTP status plus raw body. Status 0 means the
/// request never reached the server.
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The server's `{"detail": ...}` message, or a generic fallback.
    pub fn detail(&self) -> String {
        if self.status == 0 {
            return "Network error".to_string();
        }
        serde_json::from_str::<ApiError>(&self.body)
            .map(|error| error.detail)
            .unwrap_or_else(|_| format!("Request failed ({})", self.status))
    }
}

/// Fires a fetch and hands the reply to `on_done`. Both the response and its
/// body arrive through promises, so the callback is shared across the two
/// stages.
pub fn http_request(
    window: &Window,
    method: &str,
    url: &str,
    token: Option<&str>,
    body: Option<String>,
    on_done: impl FnMut(HttpReply) + 'static,
) {
    let opts = RequestInit::new();
    opts.set_method(method);
    if let Some(body) = &body {
        opts.set_body(&JsValue::from_str(body));
    }
    let request = match Request::new_with_str_and_init(url, &opts) {
        Ok(request) => request,
        Err(_) => return,
    };
    if body.is_some() {
        let _ = request.headers().set("Content-Type", "application/json");
    }
    if let Some(token) = token {
        let _ = request
            .headers()
            .set("Authorization", &format!("Bearer {token}"));
    }

    let on_done = Rc::new(RefCell::new(on_done));
    let on_done_for_error = on_done.clone();

    let on_response = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
        let Ok(response) = value.dyn_into::<Response>() else {
            return;
        };
        let status = response.status();
        let Ok(text_promise) = response.text() else {
            (&mut *on_done.borrow_mut())(HttpReply {
                status,
                body: String::new(),
            });
            return;
        };
        let on_done = on_done.clone();
        let on_text = Closure::<dyn FnMut(JsValue)>::new(move |text: JsValue| {
            (&mut *on_done.borrow_mut())(HttpReply {
                status,
                body: text.as_string().unwrap_or_default(),
            });
        });
        let _ = text_promise.then(&on_text);
        on_text.forget();
    });
    let on_error = Closure::<dyn FnMut(JsValue)>::new(move |_| {
        (&mut *on_done_for_error.borrow_mut())(HttpReply {
            status: 0,
            body: String::new(),
        });
    });

    let promise = window.fetch_with_request(&request);
    let _ = promise.then(&on_response).catch(&on_error);
    on_response.forget();
    on_error.forget();
}

pub fn login(
    window: &Window,
    username: &str,
    password: &str,
    mut on_done: impl FnMut(Result<TokenResponse, String>) + 'static,
) {
    let body = serde_json::to_string(&Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
    .ok();
    http_request(window, "POST", "/login", None, body, move |reply| {
        if !reply.ok() {
            on_done(Err(reply.detail()));
            return;
        }
        match serde_json::from_str::<TokenResponse>(&reply.body) {
            Ok(token) => on_done(Ok(token)),
            Err(_) => on_done(Err("Malformed login response".to_string())),
        }
    });
}

pub fn register(
    window: &Window,
    username: &str,
    password: &str,
    mut on_done: impl FnMut(Result<(), String>) + 'static,
) {
    let body = serde_json::to_string(&Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
    .ok();
    http_request(window, "POST", "/register", None, body, move |reply| {
        if reply.ok() {
            on_done(Ok(()));
        } else {
            on_done(Err(reply.detail()));
        }
    });
}

pub fn save_diagram(
    window: &Window,
    token: &str,
    request: &SaveDiagramRequest,
    mut on_done: impl FnMut(Result<SaveDiagramResponse, String>) + 'static,
) {
    let body = serde_json::to_string(request).ok();
    http_request(
        window,
        "POST",
        "/save_diagram",
        Some(token),
        body,
        move |reply| {
            if !reply.ok() {
                on_done(Err(reply.detail()));
                return;
            }
            match serde_json::from_str::<SaveDiagramResponse>(&reply.body) {
                Ok(saved) => on_done(Ok(saved)),
                Err(_) => on_done(Err("Malformed save response".to_string())),
            }
        },
    );
}

pub fn get_diagrams(
    window: &Window,
    token: &str,
    username: &str,
    mut on_done: impl FnMut(Result<Vec<DiagramRecord>, String>) + 'static,
) {
    let url = format!("/get_diagrams/{username}");
    http_request(window, "GET", &url, Some(token), None, move |reply| {
        if !reply.ok() {
            on_done(Err(reply.detail()));
            return;
        }
        match serde_json::from_str::<Vec<DiagramRecord>>(&reply.body) {
            Ok(diagrams) => on_done(Ok(diagrams)),
            Err(_) => on_done(Err("Malformed diagram list".to_string())),
        }
    });
}

pub fn delete_diagram(
    window: &Window,
    token: &str,
    id: u64,
    mut on_done: impl FnMut(Result<(), String>) + 'static,
) {
    let url = format!("/delete_diagram/{id}");
    http_request(window, "DELETE", &url, Some(token), None, move |reply| {
        if reply.ok() {
            on_done(Ok(()));
        } else {
            on_done(Err(reply.detail()));
        }
    });
}

pub fn rename_diagram(
    window: &Window,
    token: &str,
    id: u64,
    title: &str,
    mut on_done: impl FnMut(Result<(), String>) + 'static,
) {
    let url = format!("/rename_diagram/{id}");
    let body = serde_json::to_string(&RenameDiagramRequest {
        title: title.to_string(),
    })
    .ok();
    http_request(window, "PUT", &url, Some(token), body, move |reply| {
        if reply.ok() {
            on_done(Ok(()));
        } else {
            on_done(Err(reply.detail()));
        }
    });
}
