#[macro_use]
extern crate nolog;

use argh::FromArgs;

use optical_link::config::Role;

#[derive(FromArgs)]
#[argh(description = "Bridge Ethernet frames across the free-space optical link")]
struct Args {
    #[argh(option, short = 'r')]
    #[argh(description = "node role: station or access-point")]
    role: Role,

    #[argh(option, short = 'i')]
    #[argh(description = "override the profile's network interface")]
    interface: Option<String>,

    #[argh(option)]
    #[argh(description = "bound hardware polling instead of waiting forever (milliseconds)")]
    poll_timeout_ms: Option<u64>,
}

#[cfg(target_os = "linux")]
fn main() {
    use std::time::Duration;

    use optical_link::net::{lockdown, PacketSocket};
    use optical_link::phy::regs::{
        DevMem, NarrowRxPort, NarrowTxPort, WideRxPort, WideTxPort,
    };
    use optical_link::pipeline::PipelineSupervisor;
    use optical_link::symbol::{NarrowDeframer, NarrowFramer, WideDeframer, WideFramer};

    let args: Args = argh::from_env();

    let mut config = args.role.profile();
    if let Some(iface) = args.interface {
        config.iface = iface;
    }
    if let Some(timeout) = args.poll_timeout_ms {
        config.poll.timeout = Some(Duration::from_millis(timeout));
    }

    lockdown::raise_priority();
    if let Err(err) = lockdown::apply_firewall() {
        error!("Firewall lockdown failed: {err}");
        std::process::exit(1);
    }
    lockdown::drop_stale_link_local(&config.iface);

    let socket = match PacketSocket::open(&config.iface) {
        Ok(socket) => socket,
        Err(err) => {
            error!("Opening {} failed: {err}", config.iface);
            std::process::exit(1);
        }
    };

    // Discovered interface addresses take precedence over the profile.
    config.own_mac = socket.mac();
    if let Some(ip) = socket.ip() {
        config.own_ip = ip;
    }
    info!(
        "{} is {:02X?} / {}",
        config.iface, config.own_mac, config.own_ip
    );

    let rx_regs = DevMem::map(config.optical_rx_base);
    let tx_regs = DevMem::map(config.optical_tx_base);
    let (rx_regs, tx_regs) = match (rx_regs, tx_regs) {
        (Ok(rx), Ok(tx)) => (rx, tx),
        (Err(err), _) | (_, Err(err)) => {
            error!("Mapping the optical registers failed: {err}");
            std::process::exit(1);
        }
    };

    let supervisor = match config.role {
        Role::Station => PipelineSupervisor::launch(
            config.clone(),
            WideRxPort::new(rx_regs, config.poll),
            WideDeframer::new(),
            NarrowTxPort::new(tx_regs, config.poll),
            NarrowFramer,
            socket,
        ),
        Role::AccessPoint => PipelineSupervisor::launch(
            config.clone(),
            NarrowRxPort::new(rx_regs, config.poll),
            NarrowDeframer::new(),
            WideTxPort::new(tx_regs, config.poll),
            WideFramer,
            socket,
        ),
    };

    info!("Press enter to stop the optical bridge...");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input).unwrap();

    supervisor.shutdown();
}

#[cfg(not(target_os = "linux"))]
fn main() {
    error!("The optical bridge requires Linux (AF_PACKET and /dev/mem)");
    std::process::exit(1);
}
