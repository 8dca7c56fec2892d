use crate::bits::BitField;
use crate::codec::Reader;
use crate::error::DecodeError;
use crate::factory::{DecodeCtx, PacketFactories};

enum_sim! {
    /// Next extension header type, TS 29.281 5.2.1.
    pub struct GtpExtensionType (u8) {
        /// No more extension headers.
        NO_MORE = 0x00,
        /// Long PDCP PDU number.
        LONG_PDU_NUMBER = 0x03,
        /// Service class indicator.
        SERVICE_CLASS_INDICATOR = 0x20,
        /// UDP port.
        UDP_PORT = 0x40,
        /// RAN container.
        RAN_CONTAINER = 0x81,
        /// Long PDCP PDU number, second code point.
        LONG_PDU_NUMBER_2 = 0x82,
        /// Xw RAN container.
        XW_RAN_CONTAINER = 0x83,
        /// NR RAN container.
        NR_RAN_CONTAINER = 0x84,
        /// PDU session container.
        PDU_SESSION_CONTAINER = 0x85,
        /// PDCP PDU number.
        PDU_NUMBER = 0xc0,
    }
}

/// PDU type of downlink PDU session information, TS 38.415.
pub const PDU_TYPE_DL: u8 = 0;
/// PDU type of uplink PDU session information.
pub const PDU_TYPE_UL: u8 = 1;

const PDU_TYPE: BitField = BitField::new(4, 4);
// DL byte 0
const DL_QMP: BitField = BitField::flag(3);
const DL_SNP: BitField = BitField::flag(2);
const DL_MSNP: BitField = BitField::flag(1);
const DL_SPARE: BitField = BitField::flag(0);
// DL byte 1
const PPP: BitField = BitField::flag(7);
const RQI: BitField = BitField::flag(6);
// UL byte 0
const UL_QMP: BitField = BitField::flag(3);
const DL_DELAY_IND: BitField = BitField::flag(2);
const UL_DELAY_IND: BitField = BitField::flag(1);
const UL_SNP: BitField = BitField::flag(0);
// UL byte 1
const N3_N9_DELAY_IND: BitField = BitField::flag(7);
const NEW_IE_FLAG: BitField = BitField::flag(6);

const QFI: BitField = BitField::new(0, 6);

/// Downlink PDU session information. Each optional field is present on the
/// wire when its flag is set; the flags are derived from the fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DlPduSessionInfo {
    /// QoS flow identifier, 6 bits.
    pub qfi: u8,
    /// Reflective QoS indicator.
    pub rqi: bool,
    /// The spare bit of the first octet.
    pub spare: bool,
    /// Paging policy indicator octet (PPI in the upper 3 bits), flag PPP.
    pub ppi: Option<u8>,
    /// DL sending time stamp, flag QMP.
    pub dl_sending_time_stamp: Option<u64>,
    /// DL QFI sequence number (24 bits), flag SNP.
    pub dl_qfi_seq_number: Option<u32>,
    /// DL MBS QFI sequence number, flag MSNP.
    pub dl_mbs_qfi_seq_number: Option<u32>,
}

impl DlPduSessionInfo {
    fn content_len(&self) -> usize {
        2 + self.ppi.map_or(0, |_| 1)
            + self.dl_sending_time_stamp.map_or(0, |_| 8)
            + self.dl_qfi_seq_number.map_or(0, |_| 3)
            + self.dl_mbs_qfi_seq_number.map_or(0, |_| 4)
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        let mut b0 = PDU_TYPE.put(0, PDU_TYPE_DL as u32);
        b0 = DL_QMP.put_flag(b0, self.dl_sending_time_stamp.is_some());
        b0 = DL_SNP.put_flag(b0, self.dl_qfi_seq_number.is_some());
        b0 = DL_MSNP.put_flag(b0, self.dl_mbs_qfi_seq_number.is_some());
        b0 = DL_SPARE.put_flag(b0, self.spare);
        let mut b1 = PPP.put_flag(0, self.ppi.is_some());
        b1 = RQI.put_flag(b1, self.rqi);
        b1 = QFI.put(b1, self.qfi as u32);
        out.push(b0 as u8);
        out.push(b1 as u8);
        if let Some(ppi) = self.ppi {
            out.push(ppi);
        }
        if let Some(ts) = self.dl_sending_time_stamp {
            out.extend_from_slice(&ts.to_be_bytes());
        }
        if let Some(seq) = self.dl_qfi_seq_number {
            out.extend_from_slice(&seq.to_be_bytes()[1..]);
        }
        if let Some(seq) = self.dl_mbs_qfi_seq_number {
            out.extend_from_slice(&seq.to_be_bytes());
        }
    }

    // `r` starts at the first content octet.
    fn parse(r: &Reader<'_>) -> Result<Self, DecodeError> {
        r.require(2)?;
        let b0 = r.u8(0)? as u32;
        let b1 = r.u8(1)? as u32;
        let mut info = Self {
            qfi: QFI.get(b1) as u8,
            rqi: RQI.is_set(b1),
            spare: DL_SPARE.is_set(b0),
            ..Self::default()
        };
        // every optional field is counted so the length can be checked first
        let mut layout = info;
        layout.ppi = PPP.is_set(b1).then_some(0);
        layout.dl_sending_time_stamp = DL_QMP.is_set(b0).then_some(0);
        layout.dl_qfi_seq_number = DL_SNP.is_set(b0).then_some(0);
        layout.dl_mbs_qfi_seq_number = DL_MSNP.is_set(b0).then_some(0);
        r.require(layout.content_len())?;

        let mut at = 2;
        if layout.ppi.is_some() {
            info.ppi = Some(r.u8(at)?);
            at += 1;
        }
        if layout.dl_sending_time_stamp.is_some() {
            info.dl_sending_time_stamp = Some(r.u64(at)?);
            at += 8;
        }
        if layout.dl_qfi_seq_number.is_some() {
            info.dl_qfi_seq_number = Some(r.u24(at)?);
            at += 3;
        }
        if layout.dl_mbs_qfi_seq_number.is_some() {
            info.dl_mbs_qfi_seq_number = Some(r.u32(at)?);
        }
        Ok(info)
    }
}

/// The three time stamps carried when QMP is set in uplink information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct UlTimeStamps {
    /// DL sending time stamp repeated.
    pub dl_sending_repeated: u64,
    /// DL received time stamp.
    pub dl_received: u64,
    /// UL sending time stamp.
    pub ul_sending: u64,
}

/// Uplink PDU session information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct UlPduSessionInfo {
    /// QoS flow identifier, 6 bits.
    pub qfi: u8,
    /// Time stamps, flag QMP.
    pub time_stamps: Option<UlTimeStamps>,
    /// DL delay result, flag DL delay ind.
    pub dl_delay_result: Option<u32>,
    /// UL delay result, flag UL delay ind.
    pub ul_delay_result: Option<u32>,
    /// UL QFI sequence number (24 bits), flag SNP.
    pub ul_qfi_seq_number: Option<u32>,
    /// N3/N9 delay result, flag N3/N9 delay ind.
    pub n3_n9_delay_result: Option<u32>,
    /// New IE flags octet, flag new IE.
    pub new_ie_flags: Option<u8>,
}

impl UlPduSessionInfo {
    fn content_len(&self) -> usize {
        2 + self.time_stamps.map_or(0, |_| 24)
            + self.dl_delay_result.map_or(0, |_| 4)
            + self.ul_delay_result.map_or(0, |_| 4)
            + self.ul_qfi_seq_number.map_or(0, |_| 3)
            + self.n3_n9_delay_result.map_or(0, |_| 4)
            + self.new_ie_flags.map_or(0, |_| 1)
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        let mut b0 = PDU_TYPE.put(0, PDU_TYPE_UL as u32);
        b0 = UL_QMP.put_flag(b0, self.time_stamps.is_some());
        b0 = DL_DELAY_IND.put_flag(b0, self.dl_delay_result.is_some());
        b0 = UL_DELAY_IND.put_flag(b0, self.ul_delay_result.is_some());
        b0 = UL_SNP.put_flag(b0, self.ul_qfi_seq_number.is_some());
        let mut b1 = N3_N9_DELAY_IND.put_flag(0, self.n3_n9_delay_result.is_some());
        b1 = NEW_IE_FLAG.put_flag(b1, self.new_ie_flags.is_some());
        b1 = QFI.put(b1, self.qfi as u32);
        out.push(b0 as u8);
        out.push(b1 as u8);
        if let Some(ts) = self.time_stamps {
            out.extend_from_slice(&ts.dl_sending_repeated.to_be_bytes());
            out.extend_from_slice(&ts.dl_received.to_be_bytes());
            out.extend_from_slice(&ts.ul_sending.to_be_bytes());
        }
        for result in [self.dl_delay_result, self.ul_delay_result].into_iter().flatten() {
            out.extend_from_slice(&result.to_be_bytes());
        }
        if let Some(seq) = self.ul_qfi_seq_number {
            out.extend_from_slice(&seq.to_be_bytes()[1..]);
        }
        if let Some(result) = self.n3_n9_delay_result {
            out.extend_from_slice(&result.to_be_bytes());
        }
        if let Some(flags) = self.new_ie_flags {
            out.push(flags);
        }
    }

    fn parse(r: &Reader<'_>) -> Result<Self, DecodeError> {
        r.require(2)?;
        let b0 = r.u8(0)? as u32;
        let b1 = r.u8(1)? as u32;
        let mut info = Self {
            qfi: QFI.get(b1) as u8,
            ..Self::default()
        };
        let mut layout = info;
        layout.time_stamps = UL_QMP.is_set(b0).then(UlTimeStamps::default);
        layout.dl_delay_result = DL_DELAY_IND.is_set(b0).then_some(0);
        layout.ul_delay_result = UL_DELAY_IND.is_set(b0).then_some(0);
        layout.ul_qfi_seq_number = UL_SNP.is_set(b0).then_some(0);
        layout.n3_n9_delay_result = N3_N9_DELAY_IND.is_set(b1).then_some(0);
        layout.new_ie_flags = NEW_IE_FLAG.is_set(b1).then_some(0);
        r.require(layout.content_len())?;

        let mut at = 2;
        if layout.time_stamps.is_some() {
            info.time_stamps = Some(UlTimeStamps {
                dl_sending_repeated: r.u64(at)?,
                dl_received: r.u64(at + 8)?,
                ul_sending: r.u64(at + 16)?,
            });
            at += 24;
        }
        if layout.dl_delay_result.is_some() {
            info.dl_delay_result = Some(r.u32(at)?);
            at += 4;
        }
        if layout.ul_delay_result.is_some() {
            info.ul_delay_result = Some(r.u32(at)?);
            at += 4;
        }
        if layout.ul_qfi_seq_number.is_some() {
            info.ul_qfi_seq_number = Some(r.u24(at)?);
            at += 3;
        }
        if layout.n3_n9_delay_result.is_some() {
            info.n3_n9_delay_result = Some(r.u32(at)?);
            at += 4;
        }
        if layout.new_ie_flags.is_some() {
            info.new_ie_flags = Some(r.u8(at)?);
        }
        Ok(info)
    }
}

/// Content of a PDU session container, selected by the PDU type nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PduSessionInfo {
    /// PDU type 0.
    Downlink(DlPduSessionInfo),
    /// PDU type 1.
    Uplink(UlPduSessionInfo),
}

impl PduSessionInfo {
    fn content_len(&self) -> usize {
        match self {
            PduSessionInfo::Downlink(info) => info.content_len(),
            PduSessionInfo::Uplink(info) => info.content_len(),
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            PduSessionInfo::Downlink(info) => info.write_to(out),
            PduSessionInfo::Uplink(info) => info.write_to(out),
        }
    }
}

/// One GTPv1-U extension header, without its next-type octet.
///
/// On the wire an extension is a length octet counting 4-octet units, the
/// content, then the type of the next extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GtpExtension {
    /// UDP port of the triggering message.
    UdpPort(u16),
    /// PDCP PDU number.
    PduNumber(u16),
    /// Long PDCP PDU number. The first three octets hold the 18-bit number
    /// and six spare bits, kept as found.
    LongPduNumber {
        /// Which of the two code points was used.
        ext_type: GtpExtensionType,
        /// The 24 bits holding the number.
        number: u32,
        /// The three spare octets.
        spare: [u8; 3],
    },
    /// Service class indicator.
    ServiceClassIndicator {
        /// The indicator.
        sci: u8,
        /// The spare octet.
        spare: u8,
    },
    /// PDU session container.
    PduSessionContainer {
        /// Session information.
        info: PduSessionInfo,
        /// Octets between the information and the next-type octet.
        padding: Vec<u8>,
    },
    /// An extension without a dedicated decoder.
    Unknown {
        /// Extension type.
        ext_type: GtpExtensionType,
        /// Content octets.
        content: Vec<u8>,
    },
}

/// Number of 4-octet units an extension with `content_len` content octets needs.
fn units_for(content_len: usize) -> usize {
    (content_len + 2 + 3) / 4
}

impl GtpExtension {
    /// A PDU session container with the zero padding its content requires.
    pub fn pdu_session_container(info: PduSessionInfo) -> Self {
        let content = info.content_len();
        GtpExtension::PduSessionContainer {
            info,
            padding: vec![0; units_for(content) * 4 - 2 - content],
        }
    }

    /// The extension type announced by the preceding header.
    pub fn ext_type(&self) -> GtpExtensionType {
        match self {
            GtpExtension::UdpPort(_) => GtpExtensionType::UDP_PORT,
            GtpExtension::PduNumber(_) => GtpExtensionType::PDU_NUMBER,
            GtpExtension::LongPduNumber { ext_type, .. } => *ext_type,
            GtpExtension::ServiceClassIndicator { .. } => GtpExtensionType::SERVICE_CLASS_INDICATOR,
            GtpExtension::PduSessionContainer { .. } => GtpExtensionType::PDU_SESSION_CONTAINER,
            GtpExtension::Unknown { ext_type, .. } => *ext_type,
        }
    }

    // Decoders shared by several code points cannot see the key they were
    // looked up with.
    pub(crate) fn with_type(self, ext_type: GtpExtensionType) -> Self {
        match self {
            GtpExtension::LongPduNumber { number, spare, .. } => GtpExtension::LongPduNumber {
                ext_type,
                number,
                spare,
            },
            GtpExtension::Unknown { content, .. } => GtpExtension::Unknown { ext_type, content },
            other => other,
        }
    }

    fn content_len(&self) -> usize {
        match self {
            GtpExtension::UdpPort(_)
            | GtpExtension::PduNumber(_)
            | GtpExtension::ServiceClassIndicator { .. } => 2,
            GtpExtension::LongPduNumber { .. } => 6,
            GtpExtension::PduSessionContainer { info, padding } => info.content_len() + padding.len(),
            GtpExtension::Unknown { content, .. } => content.len(),
        }
    }

    /// Number of octets on the wire, including the length and next-type octets.
    pub fn length(&self) -> usize {
        self.content_len() + 2
    }

    /// Append the wire representation followed by `next`.
    ///
    /// The length octet is the wire length in 4-octet units, rounded down;
    /// builders reject lengths that are not a multiple of 4.
    pub fn write_to(&self, next: GtpExtensionType, out: &mut Vec<u8>) {
        out.push((self.length() / 4) as u8);
        match self {
            GtpExtension::UdpPort(value) | GtpExtension::PduNumber(value) => {
                out.extend_from_slice(&value.to_be_bytes())
            }
            GtpExtension::LongPduNumber { number, spare, .. } => {
                out.extend_from_slice(&number.to_be_bytes()[1..]);
                out.extend_from_slice(spare);
            }
            GtpExtension::ServiceClassIndicator { sci, spare } => {
                out.push(*sci);
                out.push(*spare);
            }
            GtpExtension::PduSessionContainer { info, padding } => {
                info.write_to(out);
                out.extend_from_slice(padding);
            }
            GtpExtension::Unknown { content, .. } => out.extend_from_slice(content),
        }
        out.push(next.raw());
    }
}

const PROTOCOL: &str = "GTPv1 extension";

// Checks that a fixed-size extension declares `units` and fits the window.
fn fixed(r: &Reader<'_>, units: u8) -> Result<(), DecodeError> {
    r.require(1)?;
    let declared = r.u8(0)?;
    if declared != units {
        return Err(r.invalid(0, "extension length", declared as u64));
    }
    r.require(units as usize * 4)
}

fn decode_udp_port(
    bytes: &[u8],
    offset: usize,
    length: usize,
    _ctx: &DecodeCtx<'_>,
) -> Result<GtpExtension, DecodeError> {
    let r = Reader::new(PROTOCOL, bytes, offset, length)?;
    fixed(&r, 1)?;
    Ok(GtpExtension::UdpPort(r.u16(1)?))
}

fn decode_pdu_number(
    bytes: &[u8],
    offset: usize,
    length: usize,
    _ctx: &DecodeCtx<'_>,
) -> Result<GtpExtension, DecodeError> {
    let r = Reader::new(PROTOCOL, bytes, offset, length)?;
    fixed(&r, 1)?;
    Ok(GtpExtension::PduNumber(r.u16(1)?))
}

fn decode_service_class_indicator(
    bytes: &[u8],
    offset: usize,
    length: usize,
    _ctx: &DecodeCtx<'_>,
) -> Result<GtpExtension, DecodeError> {
    let r = Reader::new(PROTOCOL, bytes, offset, length)?;
    fixed(&r, 1)?;
    Ok(GtpExtension::ServiceClassIndicator {
        sci: r.u8(1)?,
        spare: r.u8(2)?,
    })
}

fn decode_long_pdu_number(
    bytes: &[u8],
    offset: usize,
    length: usize,
    _ctx: &DecodeCtx<'_>,
) -> Result<GtpExtension, DecodeError> {
    let r = Reader::new(PROTOCOL, bytes, offset, length)?;
    fixed(&r, 2)?;
    let mut spare = [0; 3];
    spare.copy_from_slice(r.slice(4, 3)?);
    Ok(GtpExtension::LongPduNumber {
        ext_type: GtpExtensionType::LONG_PDU_NUMBER,
        number: r.u24(1)?,
        spare,
    })
}

fn decode_pdu_session_container(
    bytes: &[u8],
    offset: usize,
    length: usize,
    _ctx: &DecodeCtx<'_>,
) -> Result<GtpExtension, DecodeError> {
    let r = Reader::new(PROTOCOL, bytes, offset, length)?;
    r.require(2)?;
    let declared = r.u8(0)?;
    let content = r.sub("PDU session container", 1, r.len() - 1)?;
    let info = match PDU_TYPE.get(r.u8(1)? as u32) as u8 {
        PDU_TYPE_DL => PduSessionInfo::Downlink(DlPduSessionInfo::parse(&content)?),
        PDU_TYPE_UL => PduSessionInfo::Uplink(UlPduSessionInfo::parse(&content)?),
        other => return Err(r.invalid(1, "PDU type", other as u64)),
    };
    let units = units_for(info.content_len());
    if declared as usize != units {
        return Err(r.invalid(0, "extension length", declared as u64));
    }
    if units * 4 > r.len() {
        return Err(r.inconsistent(0, "extension length", units * 4));
    }
    let padding_at = 1 + info.content_len();
    Ok(GtpExtension::PduSessionContainer {
        info,
        padding: r.slice(padding_at, units * 4 - 1 - padding_at)?.to_vec(),
    })
}

/// The catch-all of the GTPv1 extension registry: any non-zero length.
pub fn decode_unknown_extension(
    bytes: &[u8],
    offset: usize,
    length: usize,
    _ctx: &DecodeCtx<'_>,
) -> Result<GtpExtension, DecodeError> {
    let r = Reader::new(PROTOCOL, bytes, offset, length)?;
    r.require(1)?;
    let units = r.u8(0)? as usize;
    if units == 0 {
        return Err(r.invalid(0, "extension length", 0));
    }
    if units * 4 > r.len() {
        return Err(r.inconsistent(0, "extension length", units * 4));
    }
    Ok(GtpExtension::Unknown {
        ext_type: GtpExtensionType::NO_MORE,
        content: r.slice(1, units * 4 - 2)?.to_vec(),
    })
}

/// Decode the extension chain starting with type `first` at `offset`.
///
/// Returns the extensions, the next-type octet of the last one (the type
/// that could not be decoded when the chain was cut short) and whether the
/// chain was cut short.
pub(crate) fn decode_extensions(
    bytes: &[u8],
    offset: usize,
    length: usize,
    first: GtpExtensionType,
    ctx: &DecodeCtx<'_>,
) -> (Vec<GtpExtension>, GtpExtensionType, bool) {
    let registry = &ctx.factories().gtpv1_extensions;
    let mut extensions = Vec::new();
    let mut next = first;
    let mut at = 0;
    while next != GtpExtensionType::NO_MORE {
        let decoded = registry
            .decode(next, bytes, offset + at, length - at, ctx)
            .and_then(|ext| {
                let next_at = at + ext.length() - 1;
                let r = Reader::new(PROTOCOL, bytes, offset, length)?;
                Ok((ext, r.u8(next_at)?))
            });
        match decoded {
            Ok((ext, following)) => {
                let ext = ext.with_type(next);
                at += ext.length();
                extensions.push(ext);
                next = following.into();
            }
            Err(error) => {
                tracing::warn!(
                    protocol = PROTOCOL,
                    offset = offset + at,
                    ext_type = %next,
                    %error,
                    "extension header chain truncated"
                );
                return (extensions, next, true);
            }
        }
    }
    (extensions, next, false)
}

pub(crate) fn register(factories: &mut PacketFactories) {
    factories
        .gtpv1_extensions
        .register(GtpExtensionType::UDP_PORT, decode_udp_port)
        .register(GtpExtensionType::PDU_NUMBER, decode_pdu_number)
        .register(GtpExtensionType::LONG_PDU_NUMBER, decode_long_pdu_number)
        .register(GtpExtensionType::LONG_PDU_NUMBER_2, decode_long_pdu_number)
        .register(
            GtpExtensionType::SERVICE_CLASS_INDICATOR,
            decode_service_class_indicator,
        )
        .register(
            GtpExtensionType::PDU_SESSION_CONTAINER,
            decode_pdu_session_container,
        );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DecodeCtx<'static> {
        DecodeCtx::global()
    }

    #[test]
    fn udp_port_is_four_bytes() {
        let bytes = [0x01, 0x08, 0x68, 0x00];
        let ext = decode_udp_port(&bytes, 0, bytes.len(), &ctx()).unwrap();
        assert_eq!(ext, GtpExtension::UdpPort(2152));
        assert_eq!(ext.length(), 4);

        let mut out = Vec::new();
        ext.write_to(GtpExtensionType::NO_MORE, &mut out);
        assert_eq!(out, bytes);
    }

    #[test]
    fn fixed_size_rejects_other_lengths() {
        for declared in [0u8, 2, 3, 255] {
            let bytes = [declared, 0x08, 0x68, 0x00, 0, 0, 0, 0, 0, 0, 0, 0];
            assert!(matches!(
                decode_udp_port(&bytes, 0, bytes.len(), &ctx()),
                Err(DecodeError::InvalidField { .. })
            ));
            assert!(decode_pdu_number(&bytes, 0, bytes.len(), &ctx()).is_err());
            assert!(decode_service_class_indicator(&bytes, 0, bytes.len(), &ctx()).is_err());
        }
    }

    #[test]
    fn downlink_session_container() {
        // DL, no optional fields, RQI set, QFI 9
        let bytes = [0x01, 0x00, 0x49, 0x00];
        let ext = decode_pdu_session_container(&bytes, 0, bytes.len(), &ctx()).unwrap();
        assert_eq!(
            ext,
            GtpExtension::PduSessionContainer {
                info: PduSessionInfo::Downlink(DlPduSessionInfo {
                    qfi: 9,
                    rqi: true,
                    ..DlPduSessionInfo::default()
                }),
                padding: vec![],
            }
        );

        // declaring two units for a one unit layout
        let bytes = [0x02, 0x00, 0x49, 0x00, 0, 0, 0, 0];
        assert!(decode_pdu_session_container(&bytes, 0, bytes.len(), &ctx()).is_err());
    }

    #[test]
    fn uplink_session_container() {
        let info = PduSessionInfo::Uplink(UlPduSessionInfo {
            qfi: 5,
            ul_qfi_seq_number: Some(0x010203),
            new_ie_flags: Some(0x80),
            ..UlPduSessionInfo::default()
        });
        let ext = GtpExtension::pdu_session_container(info);
        // 2 + 3 + 1 content octets, 8 on the wire
        assert_eq!(ext.length(), 8);

        let mut out = Vec::new();
        ext.write_to(GtpExtensionType::NO_MORE, &mut out);
        assert_eq!(out, [0x02, 0x11, 0x45, 0x01, 0x02, 0x03, 0x80, 0x00]);
        let decoded = decode_pdu_session_container(&out, 0, out.len(), &ctx()).unwrap();
        assert_eq!(decoded, ext);
    }

    #[test]
    fn unknown_pdu_type_fails() {
        let bytes = [0x01, 0x70, 0x00, 0x00];
        assert!(decode_pdu_session_container(&bytes, 0, bytes.len(), &ctx()).is_err());
    }

    #[test]
    fn chain_with_unknown_extension() {
        // unknown type 0x99 with 8 octets, then a PDU number
        let bytes = [0x02, 1, 2, 3, 4, 5, 6, 0xc0, 0x01, 0x00, 0x07, 0x00];
        let (exts, last, truncated) = decode_extensions(
            &bytes,
            0,
            bytes.len(),
            GtpExtensionType::from(0x99),
            &ctx(),
        );
        assert!(!truncated);
        assert_eq!(last, GtpExtensionType::NO_MORE);
        assert_eq!(
            exts,
            vec![
                GtpExtension::Unknown {
                    ext_type: GtpExtensionType::from(0x99),
                    content: vec![1, 2, 3, 4, 5, 6],
                },
                GtpExtension::PduNumber(7),
            ]
        );
    }

    #[test]
    fn chain_stops_at_bad_extension() {
        let bytes = [0x01, 0x08, 0x68, 0x40, 0x02, 0x00, 0x00, 0x00];
        let (exts, last, truncated) =
            decode_extensions(&bytes, 0, bytes.len(), GtpExtensionType::UDP_PORT, &ctx());
        assert!(truncated);
        assert_eq!(exts, vec![GtpExtension::UdpPort(2152)]);
        assert_eq!(last, GtpExtensionType::UDP_PORT);
    }
}
