//! Static description of the decoder: what it is called, which channels it
//! takes, its options and the annotations it produces.

use typed_index_collections::TiVec;

use crate::{
    decoder::StrobePolarity,
    lines::{ChannelId, NUM_ADDRESS_LINES, NUM_DATA_LINES},
    output::AnnotationClass,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    pub desc: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionInfo {
    pub id: &'static str,
    pub desc: &'static str,
    pub default: &'static str,
    pub values: &'static [&'static str],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotationRowInfo {
    pub id: &'static str,
    pub desc: &'static str,
    pub classes: &'static [AnnotationClass],
}

#[derive(Clone, Debug)]
pub struct DecoderInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub longname: &'static str,
    pub desc: &'static str,
    pub license: &'static str,
    pub inputs: &'static [&'static str],
    pub outputs: &'static [&'static str],
    pub tags: &'static [&'static str],
    pub channels: TiVec<ChannelId, ChannelInfo>,
    pub options: Vec<OptionInfo>,
    /// (class, description)
    pub annotations: Vec<(AnnotationClass, &'static str)>,
    pub annotation_rows: Vec<AnnotationRowInfo>,
}

fn channel(id: String, name: String, desc: String) -> ChannelInfo {
    ChannelInfo { id, name, desc }
}

/// The channels in bus order: strobes, then address, then data.
pub fn channel_list() -> TiVec<ChannelId, ChannelInfo> {
    let mut channels = TiVec::with_capacity(2 + NUM_ADDRESS_LINES + NUM_DATA_LINES);
    channels.push(channel("rs".into(), "RS".into(), "Read Strobe".into()));
    channels.push(channel("ws".into(), "WS".into(), "Write Strobe".into()));
    for i in 0..NUM_ADDRESS_LINES {
        channels.push(channel(
            format!("a{i}"),
            format!("A{i}"),
            format!("Address line {i}"),
        ));
    }
    for i in 0..NUM_DATA_LINES {
        channels.push(channel(
            format!("d{i}"),
            format!("D{i}"),
            format!("Data line {i}"),
        ));
    }
    channels
}

pub fn decoder_info() -> DecoderInfo {
    DecoderInfo {
        id: "async",
        name: "Async",
        longname: "Async Parallel bus",
        desc: "SRAM-like async parallel bus.",
        license: "gplv2+",
        inputs: &["logic"],
        outputs: &["async"],
        tags: &["Util"],
        channels: channel_list(),
        options: vec![OptionInfo {
            id: "strobe_pol",
            desc: "Strobe Polarity",
            default: StrobePolarity::ActiveLow.as_str(),
            values: &StrobePolarity::VALUES,
        }],
        annotations: vec![
            (AnnotationClass::Item, "Item"),
            // Historical name.
            (AnnotationClass::Warn, "Word"),
        ],
        annotation_rows: vec![
            AnnotationRowInfo {
                id: AnnotationClass::Item.row(),
                desc: "Items",
                classes: &[AnnotationClass::Item],
            },
            AnnotationRowInfo {
                id: AnnotationClass::Warn.row(),
                desc: "Warnings",
                classes: &[AnnotationClass::Warn],
            },
        ],
    }
}
