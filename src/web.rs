//! Browser rendering of the chat widget.
//!
//! `public/widget.js` loads this module and hands [`mount`] its own `<script>`
//! element, whose `data-api` and `data-business-id` attributes configure the
//! widget.

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    Document, Element, Event, EventTarget, HtmlButtonElement, HtmlElement, HtmlInputElement,
    KeyboardEvent,
};

use crate::widget::{self, Patch, Renderer, Sender, Widget, WidgetConfig, WidgetView};

const STYLE: &str = "
.air-root{position:fixed;right:20px;bottom:20px;z-index:2147483000;font:14px/1.4 system-ui,sans-serif}
.air-toggle{width:56px;height:56px;border:0;border-radius:50%;background:#2563eb;color:#fff;font-size:24px;cursor:pointer;box-shadow:0 6px 20px rgba(0,0,0,.2)}
.air-card{display:none;flex-direction:column;position:absolute;right:0;bottom:68px;width:320px;height:440px;background:#fff;border-radius:12px;box-shadow:0 10px 30px rgba(0,0,0,.2);overflow:hidden}
.air-head{padding:12px 14px;background:#2563eb;color:#fff;font-weight:600}
.air-body{flex:1;overflow-y:auto;padding:10px;display:flex;flex-direction:column;gap:6px}
.air-msg{max-width:80%;padding:8px 10px;border-radius:10px;white-space:pre-wrap;word-wrap:break-word}
.air-user{align-self:flex-end;background:#2563eb;color:#fff}
.air-bot{align-self:flex-start;background:#f1f5f9;color:#0f172a}
.air-typing{align-self:flex-start;color:#64748b;font-style:italic}
.air-row{display:flex;gap:6px;padding:10px;border-top:1px solid #e2e8f0}
.air-input{flex:1;padding:8px;border:1px solid #cbd5e1;border-radius:8px}
.air-send{padding:8px 12px;border:0;border-radius:8px;background:#2563eb;color:#fff;cursor:pointer}
.air-send:disabled,.air-input:disabled{opacity:.6;cursor:default}
";

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::new(log::Level::Info));
}

/// Builds one widget instance into the page.
#[wasm_bindgen]
pub fn mount(script: Option<Element>) -> Result<(), JsValue> {
    let config = WidgetConfig::from_attributes(|name: &str| {
        script.as_ref().and_then(|s| s.get_attribute(name))
    });
    let chat = Widget::connect(config, widget::DEFAULT_TIMEOUT)
        .map_err(|err| JsValue::from_str(&err.to_string()))?;

    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("no document to mount into"))?;
    let dom = Dom::build(&document)?;
    dom.bind(&chat)?;

    let mut updates = chat.subscribe();
    spawn_local(async move {
        let mut renderer = Renderer::new();
        let mut view = updates.borrow_and_update().clone();
        loop {
            if let Err(err) = dom.draw(&document, &view, &mut renderer) {
                web_sys::console::error_1(&err);
            }
            if updates.changed().await.is_err() {
                break;
            }
            view = updates.borrow_and_update().clone();
        }
    });
    Ok(())
}

struct Dom {
    toggle: HtmlButtonElement,
    card: HtmlElement,
    body: HtmlElement,
    typing: HtmlElement,
    input: HtmlInputElement,
    send: HtmlButtonElement,
}

impl Dom {
    fn build(document: &Document) -> Result<Self, JsValue> {
        let style = document.create_element("style")?;
        style.set_text_content(Some(STYLE));
        if let Some(head) = document.head() {
            head.append_child(&style)?;
        }

        let root: HtmlElement = element(document, "div", "air-root")?;
        let toggle: HtmlButtonElement = element(document, "button", "air-toggle")?;
        toggle.set_text_content(Some("💬"));
        toggle.set_attribute("aria-label", widget::TITLE)?;

        let card: HtmlElement = element(document, "div", "air-card")?;
        let head: HtmlElement = element(document, "div", "air-head")?;
        head.set_text_content(Some(widget::TITLE));
        let body: HtmlElement = element(document, "div", "air-body")?;
        let typing: HtmlElement = element(document, "div", "air-typing")?;
        typing.set_text_content(Some(widget::TYPING_TEXT));

        let row: HtmlElement = element(document, "div", "air-row")?;
        let input: HtmlInputElement = element(document, "input", "air-input")?;
        input.set_type("text");
        input.set_placeholder(widget::PLACEHOLDER);
        let send: HtmlButtonElement = element(document, "button", "air-send")?;
        send.set_text_content(Some(widget::SEND_LABEL));

        row.append_child(&input)?;
        row.append_child(&send)?;
        card.append_child(&head)?;
        card.append_child(&body)?;
        card.append_child(&row)?;
        root.append_child(&card)?;
        root.append_child(&toggle)?;
        document
            .body()
            .ok_or_else(|| JsValue::from_str("page has no <body>"))?
            .append_child(&root)?;

        Ok(Self {
            toggle,
            card,
            body,
            typing,
            input,
            send,
        })
    }

    fn bind(&self, chat: &Widget) -> Result<(), JsValue> {
        let w = chat.clone();
        listen(&self.toggle, "click", move |_| {
            w.toggle();
        })?;

        let w = chat.clone();
        let input = self.input.clone();
        listen(&self.input, "input", move |_| w.set_input(input.value()))?;

        let w = chat.clone();
        listen(&self.input, "keydown", move |event: Event| {
            let Some(key) = event.dyn_ref::<KeyboardEvent>().map(|e| e.key()) else {
                return;
            };
            if key != "Enter" {
                return;
            }
            event.prevent_default();
            let w = w.clone();
            spawn_local(async move {
                w.key_down(&key).await;
            });
        })?;

        let w = chat.clone();
        listen(&self.send, "click", move |_| {
            let w = w.clone();
            spawn_local(async move {
                w.click_send().await;
            });
        })
    }

    fn draw(
        &self,
        document: &Document,
        view: &WidgetView,
        renderer: &mut Renderer,
    ) -> Result<(), JsValue> {
        self.card
            .style()
            .set_property("display", if view.open { "flex" } else { "none" })?;

        for patch in renderer.patch(view) {
            match patch {
                Patch::HideTyping => self.typing.remove(),
                Patch::Append(message) => {
                    let class = match message.sender {
                        Sender::User => "air-msg air-user",
                        Sender::Bot => "air-msg air-bot",
                    };
                    let bubble: HtmlElement = element(document, "div", class)?;
                    bubble.set_text_content(Some(&message.text));
                    self.body.append_child(&bubble)?;
                }
                Patch::ShowTyping => {
                    self.body.append_child(&self.typing)?;
                }
                Patch::ScrollToBottom => self.body.set_scroll_top(self.body.scroll_height()),
            }
        }

        let disabled = view.input_disabled();
        self.input.set_disabled(disabled);
        self.send.set_disabled(disabled);
        self.send.set_text_content(Some(view.send_label()));
        if self.input.value() != view.input {
            self.input.set_value(&view.input);
        }
        if view.open && view.input_focused && !disabled {
            self.input.focus()?;
        }
        Ok(())
    }
}

fn element<T: JsCast>(document: &Document, tag: &str, class: &str) -> Result<T, JsValue> {
    let el = document.create_element(tag)?;
    el.set_class_name(class);
    el.dyn_into::<T>().map_err(JsValue::from)
}

fn listen<F>(target: &EventTarget, kind: &str, handler: F) -> Result<(), JsValue>
where
    F: FnMut(Event) + 'static,
{
    let closure = Closure::<dyn FnMut(Event)>::new(handler);
    target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())?;
    // Listeners stay registered for the lifetime of the page.
    closure.forget();
    Ok(())
}
