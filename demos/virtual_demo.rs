use padbridge::backends::virtual_pad::{VirtualDriver, VirtualPadSpec};
use padbridge::codes::code_name;
use padbridge::{Backend, BackendConfig};

fn main() {
    env_logger::init();

    let mut backend = Backend::<VirtualDriver>::with_config(BackendConfig::default()).expect("open virtual backend");
    let hub = backend.driver().hub();

    // Plug a conventional pad and wiggle it
    let pad = hub.plug(VirtualPadSpec::gamepad("Demo Virtual Pad").with_rumble(true));
    hub.press(pad, 1);
    hub.set_value(pad, 0x30, 255);
    hub.set_value(pad, 0x39, 2);
    hub.release(pad, 1);
    hub.unplug(pad);
    backend.poll(0);

    while let Some(ev) = backend.next_event() {
        println!(
            "{:<16} {:<14} {:>6.3}  {}",
            format!("{:?}", ev.kind),
            code_name(ev.code),
            ev.value,
            serde_json::to_string(&ev).unwrap_or_default()
        );
    }
}
