//! End-to-end event handling against a scripted host

use std::cell::RefCell;
use std::collections::HashMap;
use std::env::VarError;
use std::net::Ipv4Addr;
use vpnc_netconf::openconnect::{ConnectionContext, handle_event};
use vpnc_netconf::platform::probe::WindowsVersion;
use vpnc_netconf::vpn::{Network, Operation, RouteAction, plan_connect, plan_teardown};
use vpnc_netconf::{CommandExecutor, CommandOutput, Config, RedirectGatewayMethod};

const ROUTE_PRINT: &str =
    "          0.0.0.0          0.0.0.0      192.168.1.1    192.168.1.20     25\n";
const VER: &str = "Microsoft Windows [Version 10.0.19045.3570]";

#[derive(Default)]
struct FakeHost {
    failing: HashMap<String, i32>,
    log: RefCell<Vec<String>>,
}

impl FakeHost {
    fn fail(mut self, command: &str, code: i32) -> Self {
        self.failing.insert(command.to_string(), code);
        self
    }

    fn commands(&self) -> Vec<String> {
        self.log.borrow().clone()
    }
}

impl CommandExecutor for FakeHost {
    fn execute(&self, command: &str) -> CommandOutput {
        self.log.borrow_mut().push(command.to_string());
        let output = match command {
            "route print" => ROUTE_PRINT,
            "cmd /c ver" => VER,
            _ => "",
        };
        CommandOutput {
            output: output.to_string(),
            exit_code: self.failing.get(command).copied().unwrap_or(0),
        }
    }
}

fn getter(vars: &[(&str, &str)]) -> impl Fn(&str) -> Result<String, VarError> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned().ok_or(VarError::NotPresent)
}

fn env(reason: &str, extra: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut vars = vec![
        ("reason", reason),
        ("TUNIDX", "12"),
        ("TUNDEV", "tun0"),
        ("VPNGATEWAY", "203.0.113.5"),
        ("INTERNAL_IP4_ADDRESS", "10.0.0.100"),
        ("INTERNAL_IP4_NETMASK", "255.255.255.0"),
    ];
    vars.extend_from_slice(extra);
    vars.into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn run(reason: &str, extra: &[(&str, &str)], method: RedirectGatewayMethod) -> Vec<String> {
    let host = FakeHost::default();
    let vars = env(reason, extra);
    let pairs: Vec<(&str, &str)> = vars.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let config = Config {
        redirect_gateway_method: method,
        ..Config::default()
    };
    handle_event(&config, &host, getter(&pairs)).unwrap();
    host.commands()
}

fn context(extra: &[(&str, &str)]) -> ConnectionContext {
    let vars = env("connect", extra);
    let pairs: Vec<(&str, &str)> = vars.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    ConnectionContext::from_env_fn(getter(&pairs)).unwrap()
}

fn is_default_strategy_route(cmd: &str) -> bool {
    cmd.starts_with("route add 0.0.0.0 ") || cmd.starts_with("route add 128.0.0.0 ")
}

const METHODS: [RedirectGatewayMethod; 3] = [
    RedirectGatewayMethod::InterfaceGateway,
    RedirectGatewayMethod::LowMetricDefaultRoute,
    RedirectGatewayMethod::SplitDefaultPair,
];

const SPLIT_INC: &[(&str, &str)] = &[
    ("CISCO_SPLIT_INC", "2"),
    ("CISCO_SPLIT_INC_0_ADDR", "10.0.0.0"),
    ("CISCO_SPLIT_INC_0_MASK", "255.0.0.0"),
    ("CISCO_SPLIT_INC_0_MASKLEN", "8"),
    ("CISCO_SPLIT_INC_1_ADDR", "172.16.0.0"),
    ("CISCO_SPLIT_INC_1_MASK", "255.240.0.0"),
    ("CISCO_SPLIT_INC_1_MASKLEN", "12"),
];

#[test]
fn connect_interface_gateway_with_dns() {
    let cmds = run(
        "connect",
        &[("INTERNAL_IP4_DNS", "8.8.8.8")],
        RedirectGatewayMethod::InterfaceGateway,
    );

    assert_eq!(
        cmds,
        [
            "route print",
            "cmd /c ver",
            "route add 203.0.113.5 mask 255.255.255.255 192.168.1.1",
            "netsh interface ip set interface 12 metric=1",
            "netsh interface ip set address 12 static 10.0.0.100 255.255.255.0 10.0.0.1 1",
            "netsh interface ip delete wins 12 all",
            "netsh interface ipv4 delete dns 12 all",
            "netsh interface ipv6 delete dns 12 all",
            "netsh interface ipv4 add dns 12 8.8.8.8 index=1 validate=no",
        ]
    );
}

#[test]
fn connect_split_include_emits_tunnel_routes_only() {
    for method in METHODS {
        let cmds = run("connect", SPLIT_INC, method);

        assert!(cmds.contains(&"route add 10.0.0.0 mask 255.0.0.0 10.0.0.1 if 12".to_string()));
        assert!(cmds.contains(&"route add 172.16.0.0 mask 255.240.0.0 10.0.0.1 if 12".to_string()));
        assert!(!cmds.iter().any(|c| is_default_strategy_route(c)));
        assert!(!cmds.iter().any(|c| c.contains("metric=1")));
        assert!(cmds.contains(
            &"netsh interface ip set address 12 static 10.0.0.100 255.255.255.0".to_string()
        ));
    }
}

#[test]
fn connect_split_default_pair() {
    let cmds = run("connect", &[], RedirectGatewayMethod::SplitDefaultPair);

    assert!(cmds.contains(&"route add 0.0.0.0 mask 128.0.0.0 10.0.0.1".to_string()));
    assert!(cmds.contains(&"route add 128.0.0.0 mask 128.0.0.0 10.0.0.1".to_string()));
    assert!(cmds.contains(
        &"netsh interface ip set address 12 static 10.0.0.100 255.255.255.0".to_string()
    ));
}

#[test]
fn connect_emits_exactly_one_default_strategy() {
    let expected = [0, 1, 2];
    for (method, count) in METHODS.into_iter().zip(expected) {
        let cmds = run("connect", &[], method);
        let strategy: Vec<&String> = cmds.iter().filter(|c| is_default_strategy_route(c)).collect();
        assert_eq!(strategy.len(), count, "{:?}", method);

        let with_gateway = cmds.iter().any(|c| c.ends_with(" 10.0.0.1 1"));
        assert_eq!(with_gateway, method == RedirectGatewayMethod::InterfaceGateway);
    }
}

#[test]
fn disconnect_with_ipv6_and_split_exclude() {
    let cmds = run(
        "disconnect",
        &[
            ("INTERNAL_IP6_ADDRESS", "fd00::100"),
            ("CISCO_SPLIT_EXC", "1"),
            ("CISCO_SPLIT_EXC_0_ADDR", "192.168.50.0"),
            ("CISCO_SPLIT_EXC_0_MASK", "255.255.255.0"),
            ("CISCO_SPLIT_EXC_0_MASKLEN", "24"),
        ],
        RedirectGatewayMethod::InterfaceGateway,
    );

    assert_eq!(
        cmds,
        [
            "route delete 203.0.113.5 mask 255.255.255.255",
            "netsh interface ip delete address 12 10.0.0.100 gateway=all",
            "netsh interface ipv6 delete address 12 fd00::100",
            "route delete 192.168.50.0 mask 255.255.255.0",
        ]
    );
}

#[test]
fn teardown_inverts_connect() {
    let extra = [
        ("INTERNAL_IP6_ADDRESS", "fd00::100"),
        ("CISCO_SPLIT_EXC", "2"),
        ("CISCO_SPLIT_EXC_0_ADDR", "192.168.50.0"),
        ("CISCO_SPLIT_EXC_0_MASK", "255.255.255.0"),
        ("CISCO_SPLIT_EXC_1_ADDR", "198.51.100.0"),
        ("CISCO_SPLIT_EXC_1_MASK", "255.255.255.128"),
    ];
    let ctx = context(&extra);
    let gw: Option<Ipv4Addr> = Some("192.168.1.1".parse().unwrap());

    for method in METHODS {
        let config = Config {
            redirect_gateway_method: method,
            ..Config::default()
        };
        let connect = plan_connect(&ctx, &config, gw, WindowsVersion::Unknown);
        let teardown = plan_teardown(&ctx);

        let excluded: Vec<Network> = ctx
            .split_exclude
            .iter()
            .map(|e| Network::v4(e.network, e.mask))
            .collect();
        let added: Vec<Network> = connect
            .iter()
            .filter_map(Operation::as_route)
            .filter(|r| r.network == Network::host(ctx.vpn_gateway) || excluded.contains(&r.network))
            .map(|r| r.network)
            .collect();
        let deleted: Vec<Network> = teardown
            .iter()
            .filter_map(Operation::as_route)
            .filter(|r| r.action == RouteAction::Delete)
            .map(|r| r.network)
            .collect();
        assert_eq!(added, deleted);

        let v4_set = connect.iter().any(|op| {
            matches!(op, Operation::SetAddress { address, .. } if *address == ctx.ip4_address)
        });
        let v4_deleted = teardown.iter().any(|op| {
            matches!(op, Operation::DeleteAddress { address, .. } if *address == ctx.ip4_address)
        });
        assert!(v4_set && v4_deleted);

        let v6_set = connect
            .iter()
            .any(|op| matches!(op, Operation::SetIpv6Address { .. }));
        let v6_deleted = teardown
            .iter()
            .any(|op| matches!(op, Operation::DeleteIpv6Address { .. }));
        assert!(v6_set && v6_deleted);
    }
}

#[test]
fn teardown_never_deletes_tunnel_routes() {
    let mut extra = SPLIT_INC.to_vec();
    extra.push(("INTERNAL_IP6_ADDRESS", "fd00::100"));
    let cmds = run("disconnect", &extra, RedirectGatewayMethod::InterfaceGateway);

    assert!(!cmds.iter().any(|c| c.contains("10.0.0.0") || c.contains("172.16.0.0")));
    assert!(!cmds.iter().any(|c| c.contains("2000::/3")));
}

#[test]
fn dns_and_wins_keep_input_order() {
    let cmds = run(
        "connect",
        &[
            ("INTERNAL_IP4_DNS", "10.0.0.2 fd00::53 10.0.0.3"),
            ("INTERNAL_IP4_NBNS", "10.0.0.4 10.0.0.5"),
        ],
        RedirectGatewayMethod::SplitDefaultPair,
    );

    let dns: Vec<&String> = cmds.iter().filter(|c| c.contains(" add dns ")).collect();
    assert_eq!(
        dns,
        [
            "netsh interface ipv4 add dns 12 10.0.0.2 index=1 validate=no",
            "netsh interface ipv6 add dns 12 fd00::53 index=2 validate=no",
            "netsh interface ipv4 add dns 12 10.0.0.3 index=3 validate=no",
        ]
    );

    let wins: Vec<&String> = cmds.iter().filter(|c| c.contains(" add wins ")).collect();
    assert_eq!(
        wins,
        [
            "netsh interface ip add wins 12 10.0.0.4 index=1",
            "netsh interface ip add wins 12 10.0.0.5 index=2",
        ]
    );
}

#[test]
fn connect_without_servers_still_clears_wins_and_dns() {
    for method in METHODS {
        let cmds = run("connect", &[], method);
        let address = cmds
            .iter()
            .position(|c| c.starts_with("netsh interface ip set address 12 "))
            .unwrap();

        assert_eq!(
            &cmds[address + 1..address + 4],
            [
                "netsh interface ip delete wins 12 all",
                "netsh interface ipv4 delete dns 12 all",
                "netsh interface ipv6 delete dns 12 all",
            ],
            "{:?}",
            method
        );
        assert!(!cmds.iter().any(|c| c.contains(" add dns ") || c.contains(" add wins ")));
    }
}

#[test]
fn ipv6_steps_only_with_ipv6_address() {
    let without = run("connect", &[("INTERNAL_IP4_MTU", "1400")], RedirectGatewayMethod::InterfaceGateway);
    assert!(!without.iter().any(|c| c.contains("ipv6") && !c.ends_with("delete dns 12 all")));

    let with = run(
        "connect",
        &[("INTERNAL_IP4_MTU", "1400"), ("INTERNAL_IP6_ADDRESS", "fd00::100")],
        RedirectGatewayMethod::InterfaceGateway,
    );
    assert!(with.contains(&"netsh interface ipv6 set subinterface 12 mtu=1400 store=active".to_string()));
    assert!(with.contains(&"netsh interface ipv6 set address 12 fd00::100 store=active".to_string()));
    assert!(with.contains(&"netsh interface ipv6 add route 2000::/3 12 store=active".to_string()));
}

#[test]
fn exit_status_is_sum_of_failures() {
    let host = FakeHost::default()
        .fail("route add 203.0.113.5 mask 255.255.255.255 192.168.1.1", 1)
        .fail("netsh interface ip set interface 12 metric=1", 1);
    let vars = env("connect", &[]);
    let pairs: Vec<(&str, &str)> = vars.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

    let outcome = handle_event(&Config::default(), &host, getter(&pairs)).unwrap();

    assert_eq!(outcome.report.exit_status, 2);
    assert_eq!(outcome.exit_code(), 2);
    // Every planned command still ran
    assert_eq!(host.commands().len(), 8);
}
