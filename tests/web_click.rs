#![cfg(target_arch = "wasm32")]

use stagger_web::web::WebConsole;
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, Event, HtmlAnchorElement, MouseEvent, MouseEventInit};

wasm_bindgen_test_configure!(run_in_browser);

fn anchor(href: &str, navigate: bool) -> HtmlAnchorElement {
	let document = window().unwrap().document().unwrap();
	let anchor = document.create_element("a").unwrap().dyn_into::<HtmlAnchorElement>().unwrap();
	anchor.set_href(href);
	if navigate {
		anchor.set_attribute("data-navigate", "").unwrap();
	}
	anchor.set_text_content(Some("link"));
	document.body().unwrap().append_child(&anchor).unwrap();
	anchor
}

#[wasm_bindgen_test]
fn intercepts_plain_same_origin_clicks() {
	let window = window().unwrap();
	let document = window.document().unwrap();
	let location = window.location();
	let original = format!("{}{}", location.pathname().unwrap(), location.search().unwrap());

	// Keeps the test page from actually following links.
	let guard = Closure::wrap(Box::new(|event: Event| event.prevent_default()) as Box<dyn FnMut(Event)>);
	window.add_event_listener_with_callback("click", guard.as_ref().unchecked_ref()).unwrap();

	let content = document.create_element("div").unwrap();
	content.set_id("content");
	content.set_attribute("data-poll-path", "/stagger-web-test-data").unwrap();
	content.set_attribute("data-max-fetch-interval", "60000").unwrap();
	document.body().unwrap().append_child(&content).unwrap();

	let console = WebConsole::start().unwrap();
	assert_eq!(console.controller().data_path(), "/stagger-web-test-data");
	let start_path = console.path();

	anchor("https://example.invalid/tags/r/b/t", true).click();
	assert_eq!(console.path(), start_path);

	anchor("/tags/r/b/unmarked", false).click();
	assert_eq!(console.path(), start_path);

	let modified = anchor("/tags/r/b/modified", true);
	let mut init = MouseEventInit::new();
	init.bubbles(true).cancelable(true).ctrl_key(true);
	let event = MouseEvent::new_with_mouse_event_init_dict("click", &init).unwrap();
	modified.dispatch_event(&event).unwrap();
	assert_eq!(console.path(), start_path);

	anchor("/tags/r/b/t#artifacts", true).click();
	assert_eq!(console.path(), "/tags/r/b/t");
	assert_eq!(location.pathname().unwrap(), "/tags/r/b/t");
	assert_eq!(location.hash().unwrap(), "#artifacts");
	assert!(document.get_element_by_id("content").unwrap().text_content().unwrap().contains("Loading"));

	drop(console);
	anchor("/tags/r/b/after-drop", true).click();
	assert_eq!(location.pathname().unwrap(), "/tags/r/b/t");
	window.remove_event_listener_with_callback("click", guard.as_ref().unchecked_ref()).unwrap();
	window.history().unwrap().replace_state_with_url(&JsValue::NULL, "", Some(&original)).unwrap();
}
