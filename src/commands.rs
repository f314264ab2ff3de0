//! One-shot CLI command handlers
//!
//! Each function performs a single request (or window query), prints the
//! result to stdout, and returns. Errors bubble up to main.

use anyhow::{Result, bail};
use std::time::Duration;

use crate::kanata::{FakeKey, FakeKeyAction, KanataClient};
use crate::wm;

/// `-l/--layers`: print the server's layer names as a JSON array.
pub async fn print_layers(kanata: &mut KanataClient) -> Result<()> {
    let names = kanata.layer_names().await?;
    println!("{}", serde_json::to_string(&names)?);
    Ok(())
}

/// `--change-layer`: switch to the given layer.
pub async fn change_layer(kanata: &mut KanataClient, layer: &str) -> Result<()> {
    kanata.change_layer(layer).await?;
    Ok(())
}

/// `--set-mouse`: move the pointer to absolute coordinates.
pub async fn set_mouse(kanata: &mut KanataClient, x: i32, y: i32) -> Result<()> {
    kanata.set_mouse(x, y).await
}

/// `--fake-key`: trigger a virtual key action.
pub async fn fake_key(kanata: &mut KanataClient, name: &str, action: &str) -> Result<()> {
    let action: FakeKeyAction = action.parse()?;
    kanata
        .act_on_fake_key(&FakeKey {
            name: name.to_string(),
            action,
        })
        .await
}

/// `--current-layer-name`: print the active layer name.
pub async fn print_current_layer_name(kanata: &mut KanataClient) -> Result<()> {
    match kanata.current_layer_name().await? {
        Some(name) => {
            println!("{name}");
            Ok(())
        }
        None => bail!("kanata did not report the current layer"),
    }
}

/// `--current-layer-info`: print the active layer info as JSON.
pub async fn print_current_layer_info(kanata: &mut KanataClient) -> Result<()> {
    match kanata.current_layer_info().await? {
        Some(info) => {
            println!("{}", serde_json::to_string(&info)?);
            Ok(())
        }
        None => bail!("kanata did not report the current layer info"),
    }
}

/// `-w/--win`: print the focused window as JSON, optionally after a delay
/// (time to switch focus to the window of interest).
pub async fn print_window(delay_secs: u64) -> Result<()> {
    if delay_secs > 0 {
        tokio::time::sleep(Duration::from_secs(delay_secs)).await;
    }
    let mut source = wm::detect()?;
    let win = source.current_window()?;
    println!("{}", serde_json::to_string(&win)?);
    Ok(())
}
