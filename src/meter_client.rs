use bluest::Adapter;
use bluest::AdvertisingDevice;
use bluest::Characteristic;
use bluest::Device;
use bluest::Uuid;
use futures_util::Stream;
use futures_util::StreamExt;
use tokio::time::timeout;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, error, info, trace, warn};

use crate::config::{LivenessSettings, Settings};
use crate::error::{Error, Result};
use crate::liveness::Watchdog;
use crate::output::Output;
use crate::session::SessionState;

/// The characteristic the meter pushes its measurement frames on.
pub const NOTIFY_CHARACTERISTIC_ID: Uuid = Uuid::from_u128(0x0000ffe1_0000_1000_8000_00805f9b34fb);

/// A connection to a DL24 family meter.
pub struct MeterClient {
    adapter: Adapter,
    device: Device,
    notify: Option<Characteristic>,
    settings: Settings,
}

impl MeterClient {
    /// Disconnect from the meter
    pub async fn stop(self) -> Result<()> {
        self.adapter.disconnect_device(&self.device).await?;
        info!("disconnected");
        Ok(())
    }

    /// Find the meter named in `settings`, connect to it and locate its
    /// notification characteristic.
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let mut client = Self::connect_device(settings).await?;
        let notify = Self::find_characteristic(&client.device, NOTIFY_CHARACTERISTIC_ID)
            .await?
            .ok_or_else(|| {
                Error::Connection(format!(
                    "the device does not expose characteristic {NOTIFY_CHARACTERISTIC_ID}"
                ))
            })?;
        client.notify = Some(notify);
        Ok(client)
    }

    /// Find the device named in `settings` and connect to it, without
    /// requiring it to speak the meter protocol. Enough for [`Self::explore`].
    pub async fn connect_device(settings: &Settings) -> Result<Self> {
        let adapter = Self::adapter().await?;
        let device = Self::discover_device(&adapter, settings).await?;

        adapter.connect_device(&device.device).await?;
        info!(device = %Self::display_name(&device).await, "connected");

        Ok(Self { adapter, device: device.device, notify: None, settings: settings.clone() })
    }

    /// Subscribe to measurement frames and feed them to `output` until
    /// something goes wrong.
    ///
    /// Never returns `Ok`: the session ends with a decode failure, a liveness
    /// timeout, a transport error or the end of the notification stream.
    pub async fn stream(&self, output: &mut Output) -> Result<()> {
        let notify = self.notify.as_ref().ok_or_else(|| {
            Error::Connection("not connected through MeterClient::connect, no notification characteristic".into())
        })?;
        let reader = notify.notify().await?;
        info!(characteristic = %NOTIFY_CHARACTERISTIC_ID, "subscribed");

        let mut state = SessionState::new();
        supervise(reader, &mut state, output, &self.settings.liveness).await
    }

    /// Log every device seen during one scan window.
    pub async fn list_devices(window: Duration) -> Result<()> {
        let adapter = Self::adapter().await?;
        let mut adapter_events = adapter.scan(&[]).await?;
        let deadline = Instant::now() + window;

        while let Ok(Some(device)) = tokio::time::timeout_at(deadline, adapter_events.next()).await {
            info!(
                name = %Self::display_name(&device).await,
                id = ?device.device.id(),
                rssi = ?device.rssi,
                "device discovered"
            );
        }
        Ok(())
    }

    /// Log the whole GATT tree of the connected meter: services,
    /// characteristics with their properties and values, and descriptors.
    pub async fn explore(&self) -> Result<()> {
        let services = self.device.discover_services().await?;
        if services.is_empty() {
            return Err(Error::Connection("the device exposes no services".into()));
        }

        for service in services {
            info!("[Service] {}", service.uuid());

            for characteristic in service.discover_characteristics().await? {
                let props = characteristic.properties().await?;
                let value = if props.read {
                    match characteristic.read().await {
                        Ok(value) => format!(", Value: 0x{}", hex::encode(value)),
                        Err(err) => format!(", Error: {err}"),
                    }
                } else {
                    String::new()
                };
                info!("  [Characteristic] {} ({props:?}){value}", characteristic.uuid());

                for descriptor in characteristic.discover_descriptors().await? {
                    match descriptor.read().await {
                        Ok(value) => info!("    [Descriptor] {}, Value: 0x{}", descriptor.uuid(), hex::encode(value)),
                        Err(err) => error!("    [Descriptor] {}, Error: {err}", descriptor.uuid()),
                    }
                }
            }
        }

        Ok(())
    }

    async fn adapter() -> Result<Adapter> {
        let adapter = Adapter::default().await.ok_or(Error::Adapter)?;
        adapter.wait_available().await?;
        Ok(adapter)
    }

    /// Scan for a device whose name contains the configured name, backing off
    /// between scans until the attempts run out.
    async fn discover_device(adapter: &Adapter, settings: &Settings) -> Result<AdvertisingDevice> {
        let discovery = &settings.discovery;
        for attempt in 1..=discovery.attempts {
            debug!(attempt, name = %settings.device_name, "scanning");
            let found = timeout(discovery.scan_window(), Self::scan_for(adapter, &settings.device_name)).await;
            match found {
                Ok(Ok(Some(device))) => return Ok(device),
                Ok(Err(err)) => return Err(err),
                Ok(Ok(None)) | Err(_) => {
                    warn!(attempt, attempts = discovery.attempts, "device not found");
                    if attempt < discovery.attempts {
                        sleep(discovery.backoff()).await;
                    }
                }
            }
        }

        Err(Error::Discovery { name: settings.device_name.clone(), attempts: discovery.attempts })
    }

    async fn scan_for(adapter: &Adapter, name: &str) -> Result<Option<AdvertisingDevice>> {
        let mut adapter_events = adapter.scan(&[]).await?;
        while let Some(device) = adapter_events.next().await {
            let device_name = Self::display_name(&device).await;
            debug!(name = %device_name, "device discovered");
            if device_name.contains(name) {
                return Ok(Some(device));
            }
        }
        Ok(None)
    }

    async fn find_characteristic(device: &Device, uuid: Uuid) -> Result<Option<Characteristic>> {
        for service in device.discover_services().await? {
            let found = service.discover_characteristics_with_uuid(uuid).await?;
            if let Some(characteristic) = found.into_iter().next() {
                debug!(service = %service.uuid(), characteristic = %uuid, "characteristic found");
                return Ok(Some(characteristic));
            }
        }
        Ok(None)
    }

    async fn display_name(device: &AdvertisingDevice) -> String {
        match &device.adv_data.local_name {
            Some(name) => name.clone(),
            None => device.device.name_async().await.unwrap_or_default(),
        }
    }
}

/// Run the notification loop under a liveness watchdog. Whichever fails
/// first ends the session; the other side is dropped with it.
pub(crate) async fn supervise<T>(
    reader: T,
    state: &mut SessionState,
    output: &mut Output,
    liveness: &LivenessSettings,
) -> Result<()>
where
    T: Stream<Item = std::result::Result<Vec<u8>, bluest::Error>> + Unpin,
{
    let watchdog = Watchdog::new(state.last_read(), liveness.check_interval(), liveness.silence_threshold());

    tokio::select! {
        result = consume_notifications(reader, state, output) => result,
        err = watchdog.run() => Err(err),
    }
}

/// Feed notifications to `output` in arrival order until one fails or the
/// stream ends.
pub(crate) async fn consume_notifications<T>(mut reader: T, state: &mut SessionState, output: &mut Output) -> Result<()>
where
    T: Stream<Item = std::result::Result<Vec<u8>, bluest::Error>> + Unpin,
{
    while let Some(notification) = reader.next().await {
        let data = notification?;
        trace!("RX notification: 0x{}", hex::encode(&data));
        output.handle(state, &data)?;
    }

    Err(Error::Connection("end of notification stream".into()))
}
