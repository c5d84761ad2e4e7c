use padbridge::backends::PlatformDriver;
use padbridge::codes::code_name;
use padbridge::{Backend, BackendConfig, EventKind};

fn main() {
    env_logger::init();

    // Optional config file as the first argument
    let config = match std::env::args().nth(1) {
        Some(path) => BackendConfig::load(path).expect("load config"),
        None => BackendConfig::default(),
    };
    let mut backend = Backend::<PlatformDriver>::with_config(config).expect("open gamepad backend");
    println!("Waiting for gamepads ({} connected)", backend.gamepad_count());

    loop {
        backend.poll(250);
        while let Some(ev) = backend.next_event() {
            let id = ev.device_id;
            match ev.kind {
                EventKind::Connected => {
                    let device = backend.device(id);
                    println!("[{id}] connected: {} ({})", backend.name(id), backend.uuid_simple(id));
                    if let Some(device) = device {
                        println!("{}", serde_json::to_string_pretty(&device).unwrap_or_default());
                    }
                    if backend.is_ff_supported(id) {
                        backend.set_rumble(id, 0.5, 0.5, 200);
                    }
                }
                EventKind::Disconnected => println!("[{id}] disconnected"),
                _ => println!("[{id}] {:?} {} = {:.3}", ev.kind, code_name(ev.code), ev.value),
            }
        }
    }
}
