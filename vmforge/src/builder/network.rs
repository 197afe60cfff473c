//! Virtual network definition document.

use vmforge_shared::errors::{VmforgeError, VmforgeResult};

/// Gateway address of the NAT network.
pub const GATEWAY_ADDRESS: &str = "10.0.2.2";
pub const NETMASK: &str = "255.255.255.0";
pub const DHCP_START: &str = "10.0.2.15";
pub const DHCP_END: &str = "10.0.2.254";

/// Render the libvirt network XML for a NAT network named `name`.
pub fn render_network_xml(name: &str) -> VmforgeResult<String> {
    if name.trim().is_empty() {
        return Err(VmforgeError::Template(
            "network name must not be empty".into(),
        ));
    }
    if name.chars().any(char::is_control) {
        return Err(VmforgeError::Template(format!(
            "network name {:?} contains control characters",
            name
        )));
    }

    Ok(format!(
        "<network>
  <name>{name}</name>
  <forward mode='nat'/>
  <ip address='{GATEWAY_ADDRESS}' netmask='{NETMASK}'>
    <dhcp>
      <range start='{DHCP_START}' end='{DHCP_END}' />
    </dhcp>
  </ip>
</network>
",
        name = escape_xml(name),
    ))
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            c => escaped.push(c),
        }
    }
    escaped
}
