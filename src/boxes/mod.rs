// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub mod codec;
pub mod colr;
pub mod ftyp;
pub mod iloc;
pub mod iprp;
pub mod iref;
pub mod meta;
pub mod properties;

pub use codec::*;
pub use colr::*;
pub use ftyp::*;
pub use iloc::*;
pub use iprp::*;
pub use iref::*;
pub use meta::*;
pub use properties::*;

use crate::fourcc::FourCC;
use crate::internal_utils::stream::*;
use crate::internal_utils::*;
use crate::HeifError;
use crate::HeifResult;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoxSize {
    FixedSize(usize),
    UntilEndOfStream,
}

/// The 8/16/24-byte box preamble: 32-bit size + FourCC, with optional
/// 64-bit size extension and uuid typing. `size` is the body size, the
/// declared total minus the header bytes.
#[derive(Debug)]
pub struct BoxHeader {
    pub box_type: FourCC,
    pub uuid_type: Option<[u8; 16]>,
    pub size: BoxSize,
    pub header_size: usize,
    pub large_size: bool,
}

impl BoxHeader {
    pub fn parse(stream: &mut IStream) -> HeifResult<BoxHeader> {
        let available_before = stream.bytes_left();
        match Self::parse_impl(stream, available_before) {
            // A short read here means the enclosing range ends inside the
            // header, which is structural.
            Err(HeifError::InvalidField(_)) => Err(HeifError::TruncatedBox(
                "range ends inside box header".into(),
            )),
            result => result,
        }
    }

    fn parse_impl(stream: &mut IStream, available_before: usize) -> HeifResult<BoxHeader> {
        let size32 = stream.read_u32()?;
        let box_type = stream.read_fourcc()?;
        let mut large_size = false;
        let mut size = size32 as u64;
        if size32 == 1 {
            size = stream.read_u64()?;
            large_size = true;
        }
        let uuid_type: Option<[u8; 16]> = if box_type == FourCC::UUID {
            let bytes = stream.get_slice(16)?;
            let mut uuid = [0u8; 16];
            uuid.copy_from_slice(bytes);
            Some(uuid)
        } else {
            None
        };
        let header_size = checked_sub!(available_before, stream.bytes_left())?;
        if size32 == 0 && !large_size {
            // Extends to the end of the enclosing range.
            return Ok(BoxHeader {
                box_type,
                uuid_type,
                size: BoxSize::UntilEndOfStream,
                header_size,
                large_size,
            });
        }
        let body_size = size
            .checked_sub(u64_from_usize(header_size)?)
            .ok_or(HeifError::InvalidBoxSize(format!(
                "{box_type} box of {size} bytes is smaller than its header"
            )))?;
        let body_size = usize_from_u64(body_size)
            .or(Err(HeifError::InvalidBoxSize(format!("{box_type} box size overflow"))))?;
        if body_size > stream.bytes_left() {
            return Err(HeifError::TruncatedBox(format!(
                "{box_type} box of {size} bytes exceeds its enclosing range"
            )));
        }
        Ok(BoxHeader {
            box_type,
            uuid_type,
            size: BoxSize::FixedSize(body_size),
            header_size,
            large_size,
        })
    }

    pub fn body_size(&self, stream: &IStream) -> usize {
        match self.size {
            BoxSize::FixedSize(size) => size,
            BoxSize::UntilEndOfStream => stream.bytes_left(),
        }
    }
}

/// Opaque payload for boxes outside the recognized set (and for recognized
/// boxes whose body failed a soft parse); round-trips byte-exactly.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UnknownBox {
    pub data: Vec<u8>,
}

/// Raw media payload. Kept as bytes so whole-file round-trips work; a
/// writer-constructed file gets its mdat from the iloc write queue instead.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MediaDataBox {
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub enum BoxPayload {
    FileType(FileTypeBox),
    Meta(MetaBox),
    Handler(HandlerBox),
    PrimaryItem(PrimaryItemBox),
    ItemLocation(ItemLocationBox),
    ItemInfo(ItemInfoBox),
    ItemInfoEntry(ItemInfoEntryBox),
    ItemReference(ItemReferenceBox),
    // iprp and ipco have no body beyond their children.
    ItemProperties,
    PropertyContainer,
    ItemPropertyAssociation(ItemPropertyAssociationBox),
    ImageSpatialExtents(ImageSpatialExtentsBox),
    PixelAspectRatio(PixelAspectRatioBox),
    PixelInformation(PixelInformationBox),
    ImageRotation(ImageRotationBox),
    ImageMirror(ImageMirrorBox),
    AuxiliaryType(AuxiliaryTypeBox),
    CleanAperture(CleanApertureBox),
    LayerSelector(LayerSelectorBox),
    OperatingPointSelector(OperatingPointSelectorBox),
    LayeredImageIndexing(LayeredImageIndexingBox),
    ContentLightLevel(ContentLightLevelBox),
    MasteringDisplayColourVolume(MasteringDisplayColourVolumeBox),
    UserDescription(UserDescriptionBox),
    HevcConfiguration(HevcConfigurationBox),
    Av1Configuration(Av1ConfigurationBox),
    VvcConfiguration(VvcConfigurationBox),
    ColorInformation(ColorInformationBox),
    ItemData(ItemDataBox),
    GroupList,
    EntityGroup(EntityGroupBox),
    DataInformation,
    DataReference(DataReferenceBox),
    DataEntryUrl(DataEntryUrlBox),
    MediaData(MediaDataBox),
    Unknown(UnknownBox),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParseMode {
    Box,
    // Children of grpl: full boxes of any type carrying entity ids.
    EntityGroup,
}

// Deeper nesting than any conforming file; a box past this depth is
// retained opaquely instead of recursed into.
const MAX_NESTING_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy)]
struct ParseContext {
    mode: ParseMode,
    depth: usize,
}

impl ParseContext {
    fn top_level() -> ParseContext {
        ParseContext {
            mode: ParseMode::Box,
            depth: 0,
        }
    }

    fn child(self, mode: ParseMode) -> ParseContext {
        ParseContext {
            mode,
            depth: self.depth + 1,
        }
    }
}

/// A node of the box tree: FourCC identity, typed payload, owned children.
#[derive(Debug)]
pub struct BmffBox {
    pub box_type: FourCC,
    pub uuid_type: Option<[u8; 16]>,
    // Whether the size field uses (or used) the 64-bit extension.
    pub large_size: bool,
    pub payload: BoxPayload,
    pub children: Vec<BmffBox>,
}

macro_rules! payload_accessor {
    ($func:ident, $func_mut:ident, $variant:ident, $ret:ty) => {
        pub fn $func(&self) -> Option<&$ret> {
            match &self.payload {
                BoxPayload::$variant(inner) => Some(inner),
                _ => None,
            }
        }

        pub fn $func_mut(&mut self) -> Option<&mut $ret> {
            match &mut self.payload {
                BoxPayload::$variant(inner) => Some(inner),
                _ => None,
            }
        }
    };
}

impl BmffBox {
    pub fn new(box_type: FourCC, payload: BoxPayload) -> BmffBox {
        BmffBox {
            box_type,
            uuid_type: None,
            large_size: false,
            payload,
            children: Vec::new(),
        }
    }

    /// A plain or full container node with no body of its own.
    pub fn container(box_type: FourCC) -> BmffBox {
        let payload = match box_type {
            FourCC::IPRP => BoxPayload::ItemProperties,
            FourCC::IPCO => BoxPayload::PropertyContainer,
            FourCC::GRPL => BoxPayload::GroupList,
            FourCC::DINF => BoxPayload::DataInformation,
            FourCC::META => BoxPayload::Meta(MetaBox::default()),
            FourCC::IINF => BoxPayload::ItemInfo(ItemInfoBox::default()),
            FourCC::DREF => BoxPayload::DataReference(DataReferenceBox::default()),
            _ => BoxPayload::Unknown(UnknownBox::default()),
        };
        BmffBox::new(box_type, payload)
    }

    pub fn append_child_box(&mut self, child: BmffBox) -> usize {
        self.children.push(child);
        self.children.len() - 1
    }

    pub fn child_by_type(&self, box_type: FourCC) -> Option<&BmffBox> {
        self.children.iter().find(|child| child.box_type == box_type)
    }

    pub fn child_by_type_mut(&mut self, box_type: FourCC) -> Option<&mut BmffBox> {
        self.children
            .iter_mut()
            .find(|child| child.box_type == box_type)
    }

    pub fn children_by_type(&self, box_type: FourCC) -> Vec<&BmffBox> {
        self.children
            .iter()
            .filter(|child| child.box_type == box_type)
            .collect()
    }

    /// The child of the given type where the format mandates uniqueness.
    pub fn unique_child_by_type(&self, box_type: FourCC) -> HeifResult<&BmffBox> {
        let mut found = self.children.iter().filter(|child| child.box_type == box_type);
        let first = found.next().ok_or(HeifError::MissingRequiredChild(box_type))?;
        if found.next().is_some() {
            return Err(HeifError::DuplicateChild(box_type));
        }
        Ok(first)
    }

    payload_accessor!(as_ftyp, as_ftyp_mut, FileType, FileTypeBox);
    payload_accessor!(as_meta, as_meta_mut, Meta, MetaBox);
    payload_accessor!(as_hdlr, as_hdlr_mut, Handler, HandlerBox);
    payload_accessor!(as_pitm, as_pitm_mut, PrimaryItem, PrimaryItemBox);
    payload_accessor!(as_iloc, as_iloc_mut, ItemLocation, ItemLocationBox);
    payload_accessor!(as_iinf, as_iinf_mut, ItemInfo, ItemInfoBox);
    payload_accessor!(as_infe, as_infe_mut, ItemInfoEntry, ItemInfoEntryBox);
    payload_accessor!(as_iref, as_iref_mut, ItemReference, ItemReferenceBox);
    payload_accessor!(as_ipma, as_ipma_mut, ItemPropertyAssociation, ItemPropertyAssociationBox);
    payload_accessor!(as_ispe, as_ispe_mut, ImageSpatialExtents, ImageSpatialExtentsBox);
    payload_accessor!(as_pasp, as_pasp_mut, PixelAspectRatio, PixelAspectRatioBox);
    payload_accessor!(as_pixi, as_pixi_mut, PixelInformation, PixelInformationBox);
    payload_accessor!(as_irot, as_irot_mut, ImageRotation, ImageRotationBox);
    payload_accessor!(as_imir, as_imir_mut, ImageMirror, ImageMirrorBox);
    payload_accessor!(as_auxc, as_auxc_mut, AuxiliaryType, AuxiliaryTypeBox);
    payload_accessor!(as_clap, as_clap_mut, CleanAperture, CleanApertureBox);
    payload_accessor!(as_lsel, as_lsel_mut, LayerSelector, LayerSelectorBox);
    payload_accessor!(as_a1op, as_a1op_mut, OperatingPointSelector, OperatingPointSelectorBox);
    payload_accessor!(as_a1lx, as_a1lx_mut, LayeredImageIndexing, LayeredImageIndexingBox);
    payload_accessor!(as_clli, as_clli_mut, ContentLightLevel, ContentLightLevelBox);
    payload_accessor!(as_mdcv, as_mdcv_mut, MasteringDisplayColourVolume, MasteringDisplayColourVolumeBox);
    payload_accessor!(as_udes, as_udes_mut, UserDescription, UserDescriptionBox);
    payload_accessor!(as_hvcc, as_hvcc_mut, HevcConfiguration, HevcConfigurationBox);
    payload_accessor!(as_av1c, as_av1c_mut, Av1Configuration, Av1ConfigurationBox);
    payload_accessor!(as_vvcc, as_vvcc_mut, VvcConfiguration, VvcConfigurationBox);
    payload_accessor!(as_colr, as_colr_mut, ColorInformation, ColorInformationBox);
    payload_accessor!(as_idat, as_idat_mut, ItemData, ItemDataBox);
    payload_accessor!(as_entity_group, as_entity_group_mut, EntityGroup, EntityGroupBox);
    payload_accessor!(as_url, as_url_mut, DataEntryUrl, DataEntryUrlBox);

    /// Whether this box's type (or, for colr, profile type) is in the set
    /// the reader understands. Essential properties outside this set refuse
    /// presentation of the item they are attached to.
    pub fn is_recognized(&self) -> bool {
        !matches!(self.payload, BoxPayload::Unknown(_))
    }

    fn read(
        stream: &mut IStream,
        ctx: ParseContext,
        warnings: &mut Vec<HeifError>,
    ) -> HeifResult<BmffBox> {
        let header = BoxHeader::parse(stream)?;
        if !header.box_type.is_printable() {
            // Diagnostic only; the box is still carried as opaque payload.
            warnings.push(HeifError::InvalidFourCC(format!(
                "box type {} contains non-printable bytes",
                header.box_type
            )));
        }
        // Take the whole declared body up front; the parent cursor is past
        // the box end no matter how the typed parse goes.
        let body_bytes = stream.get_slice(header.body_size(stream))?;
        let mut body = IStream::create(body_bytes);
        let result = if ctx.depth > MAX_NESTING_DEPTH {
            Err(HeifError::InvalidField("box nesting too deep".into()))
        } else {
            Self::parse_payload(&header, &mut body, ctx, warnings)
        };
        let (payload, children) = match result {
            Ok(parsed) => parsed,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                // Soft failure: keep the declared range as opaque bytes and
                // let the parent continue past the box end.
                warnings.push(err);
                (
                    BoxPayload::Unknown(UnknownBox {
                        data: body_bytes.to_vec(),
                    }),
                    Vec::new(),
                )
            }
        };
        Ok(BmffBox {
            box_type: header.box_type,
            uuid_type: header.uuid_type,
            large_size: header.large_size,
            payload,
            children,
        })
    }

    fn read_children(
        stream: &mut IStream,
        ctx: ParseContext,
        warnings: &mut Vec<HeifError>,
    ) -> HeifResult<Vec<BmffBox>> {
        let mut children = Vec::new();
        while stream.has_bytes_left() {
            children.push(BmffBox::read(stream, ctx, warnings)?);
        }
        Ok(children)
    }

    /// The dispatch registry: maps the parsed FourCC to the concrete
    /// variant and delegates typed parsing within the body range.
    fn parse_payload(
        header: &BoxHeader,
        stream: &mut IStream,
        ctx: ParseContext,
        warnings: &mut Vec<HeifError>,
    ) -> HeifResult<(BoxPayload, Vec<BmffBox>)> {
        if ctx.mode == ParseMode::EntityGroup {
            let group = EntityGroupBox::parse(stream)?;
            return Ok((BoxPayload::EntityGroup(group), Vec::new()));
        }
        let no_children = Vec::new();
        Ok(match header.box_type {
            FourCC::FTYP => (BoxPayload::FileType(FileTypeBox::parse(stream)?), no_children),
            FourCC::META => {
                let meta = MetaBox::parse(stream)?;
                let children = Self::read_children(stream, ctx.child(ParseMode::Box), warnings)?;
                warn_on_duplicate_children(&children, META_UNIQUE_CHILDREN, warnings);
                (BoxPayload::Meta(meta), children)
            }
            FourCC::HDLR => (BoxPayload::Handler(HandlerBox::parse(stream)?), no_children),
            FourCC::PITM => (BoxPayload::PrimaryItem(PrimaryItemBox::parse(stream)?), no_children),
            FourCC::ILOC => {
                (BoxPayload::ItemLocation(ItemLocationBox::parse(stream)?), no_children)
            }
            FourCC::IINF => {
                let (iinf, declared_count) = ItemInfoBox::parse(stream)?;
                let children = Self::read_children(stream, ctx.child(ParseMode::Box), warnings)?;
                if declared_count as usize != children.len() {
                    warnings.push(HeifError::InvalidField(format!(
                        "iinf declares {declared_count} entries but carries {}",
                        children.len()
                    )));
                }
                (BoxPayload::ItemInfo(iinf), children)
            }
            FourCC::INFE => {
                (BoxPayload::ItemInfoEntry(ItemInfoEntryBox::parse(stream)?), no_children)
            }
            FourCC::IREF => {
                (BoxPayload::ItemReference(ItemReferenceBox::parse(stream)?), no_children)
            }
            FourCC::IPRP => {
                let children = Self::read_children(stream, ctx.child(ParseMode::Box), warnings)?;
                if children.iter().filter(|c| c.box_type == FourCC::IPCO).count() > 1 {
                    warnings.push(HeifError::DuplicateChild(FourCC::IPCO));
                }
                (BoxPayload::ItemProperties, children)
            }
            FourCC::IPCO => {
                let children = Self::read_children(stream, ctx.child(ParseMode::Box), warnings)?;
                (BoxPayload::PropertyContainer, children)
            }
            FourCC::IPMA => (
                BoxPayload::ItemPropertyAssociation(ItemPropertyAssociationBox::parse(stream)?),
                no_children,
            ),
            FourCC::ISPE => {
                (BoxPayload::ImageSpatialExtents(ImageSpatialExtentsBox::parse(stream)?), no_children)
            }
            FourCC::PASP => {
                (BoxPayload::PixelAspectRatio(PixelAspectRatioBox::parse(stream)?), no_children)
            }
            FourCC::PIXI => {
                (BoxPayload::PixelInformation(PixelInformationBox::parse(stream)?), no_children)
            }
            FourCC::IROT => (BoxPayload::ImageRotation(ImageRotationBox::parse(stream)?), no_children),
            FourCC::IMIR => (BoxPayload::ImageMirror(ImageMirrorBox::parse(stream)?), no_children),
            FourCC::AUXC => {
                (BoxPayload::AuxiliaryType(AuxiliaryTypeBox::parse(stream)?), no_children)
            }
            FourCC::CLAP => (BoxPayload::CleanAperture(CleanApertureBox::parse(stream)?), no_children),
            FourCC::LSEL => (BoxPayload::LayerSelector(LayerSelectorBox::parse(stream)?), no_children),
            FourCC::A1OP => (
                BoxPayload::OperatingPointSelector(OperatingPointSelectorBox::parse(stream)?),
                no_children,
            ),
            FourCC::A1LX => (
                BoxPayload::LayeredImageIndexing(LayeredImageIndexingBox::parse(stream)?),
                no_children,
            ),
            FourCC::CLLI => {
                (BoxPayload::ContentLightLevel(ContentLightLevelBox::parse(stream)?), no_children)
            }
            FourCC::MDCV => (
                BoxPayload::MasteringDisplayColourVolume(MasteringDisplayColourVolumeBox::parse(
                    stream,
                )?),
                no_children,
            ),
            FourCC::UDES => {
                (BoxPayload::UserDescription(UserDescriptionBox::parse(stream)?), no_children)
            }
            FourCC::HVCC => {
                (BoxPayload::HevcConfiguration(HevcConfigurationBox::parse(stream)?), no_children)
            }
            FourCC::AV1C => {
                (BoxPayload::Av1Configuration(Av1ConfigurationBox::parse(stream)?), no_children)
            }
            FourCC::VVCC => {
                (BoxPayload::VvcConfiguration(VvcConfigurationBox::parse(stream)?), no_children)
            }
            FourCC::COLR => {
                (BoxPayload::ColorInformation(ColorInformationBox::parse(stream)?), no_children)
            }
            FourCC::IDAT => (BoxPayload::ItemData(ItemDataBox::parse(stream)?), no_children),
            FourCC::GRPL => {
                let children = Self::read_children(stream, ctx.child(ParseMode::EntityGroup), warnings)?;
                (BoxPayload::GroupList, children)
            }
            FourCC::DINF => {
                let children = Self::read_children(stream, ctx.child(ParseMode::Box), warnings)?;
                (BoxPayload::DataInformation, children)
            }
            FourCC::DREF => {
                let (dref, declared_count) = DataReferenceBox::parse(stream)?;
                let children = Self::read_children(stream, ctx.child(ParseMode::Box), warnings)?;
                if declared_count as usize != children.len() {
                    warnings.push(HeifError::InvalidField(format!(
                        "dref declares {declared_count} entries but carries {}",
                        children.len()
                    )));
                }
                (BoxPayload::DataReference(dref), children)
            }
            FourCC::URL => (BoxPayload::DataEntryUrl(DataEntryUrlBox::parse(stream)?), no_children),
            FourCC::MDAT => {
                let data = stream.get_slice(stream.bytes_left())?.to_vec();
                (BoxPayload::MediaData(MediaDataBox { data }), no_children)
            }
            _ => {
                let data = stream.get_slice(stream.bytes_left())?.to_vec();
                (BoxPayload::Unknown(UnknownBox { data }), no_children)
            }
        })
    }

    /// Serializes the node: reserve the header, emit the typed body, recurse
    /// into children, then patch the header with the final size.
    pub fn write(&mut self, stream: &mut OStream) -> HeifResult<()> {
        stream.start_box_ext(self.box_type, self.uuid_type.as_ref(), self.large_size)?;
        let child_count = self.children.len();
        match &mut self.payload {
            BoxPayload::FileType(ftyp) => ftyp.write(stream)?,
            BoxPayload::Meta(meta) => meta.write(stream)?,
            BoxPayload::Handler(hdlr) => hdlr.write(stream)?,
            BoxPayload::PrimaryItem(pitm) => pitm.write(stream)?,
            BoxPayload::ItemLocation(iloc) => iloc.write(stream)?,
            BoxPayload::ItemInfo(iinf) => iinf.write(stream, child_count)?,
            BoxPayload::ItemInfoEntry(infe) => infe.write(stream)?,
            BoxPayload::ItemReference(iref) => iref.write(stream)?,
            BoxPayload::ItemProperties
            | BoxPayload::PropertyContainer
            | BoxPayload::GroupList
            | BoxPayload::DataInformation => {}
            BoxPayload::ItemPropertyAssociation(ipma) => ipma.write(stream)?,
            BoxPayload::ImageSpatialExtents(ispe) => ispe.write(stream)?,
            BoxPayload::PixelAspectRatio(pasp) => pasp.write(stream)?,
            BoxPayload::PixelInformation(pixi) => pixi.write(stream)?,
            BoxPayload::ImageRotation(irot) => irot.write(stream)?,
            BoxPayload::ImageMirror(imir) => imir.write(stream)?,
            BoxPayload::AuxiliaryType(auxc) => auxc.write(stream)?,
            BoxPayload::CleanAperture(clap) => clap.write(stream)?,
            BoxPayload::LayerSelector(lsel) => lsel.write(stream)?,
            BoxPayload::OperatingPointSelector(a1op) => a1op.write(stream)?,
            BoxPayload::LayeredImageIndexing(a1lx) => a1lx.write(stream)?,
            BoxPayload::ContentLightLevel(clli) => clli.write(stream)?,
            BoxPayload::MasteringDisplayColourVolume(mdcv) => mdcv.write(stream)?,
            BoxPayload::UserDescription(udes) => udes.write(stream)?,
            BoxPayload::HevcConfiguration(hvcc) => hvcc.write(stream)?,
            BoxPayload::Av1Configuration(av1c) => av1c.write(stream)?,
            BoxPayload::VvcConfiguration(vvcc) => vvcc.write(stream)?,
            BoxPayload::ColorInformation(colr) => colr.write(stream)?,
            BoxPayload::ItemData(idat) => idat.write(stream)?,
            BoxPayload::EntityGroup(group) => group.write(stream)?,
            BoxPayload::DataReference(dref) => dref.write(stream, child_count)?,
            BoxPayload::DataEntryUrl(url) => url.write(stream)?,
            BoxPayload::MediaData(mdat) => stream.write_slice(&mdat.data)?,
            BoxPayload::Unknown(unknown) => stream.write_slice(&unknown.data)?,
        }
        for child in &mut self.children {
            child.write(stream)?;
        }
        stream.finish_box()
    }

    /// Picks the smallest legal version (and field widths) for this box and
    /// every box below it, bottom-up.
    pub fn derive_box_version_recursive(&mut self) {
        for child in &mut self.children {
            child.derive_box_version_recursive();
        }
        let child_count = self.children.len();
        match &mut self.payload {
            BoxPayload::PrimaryItem(pitm) => pitm.derive_box_version(),
            BoxPayload::ItemLocation(iloc) => iloc.derive_box_version(),
            BoxPayload::ItemInfo(iinf) => iinf.derive_box_version(child_count),
            BoxPayload::ItemInfoEntry(infe) => infe.derive_box_version(),
            BoxPayload::ItemReference(iref) => iref.derive_box_version(),
            BoxPayload::ItemPropertyAssociation(ipma) => ipma.derive_box_version(),
            BoxPayload::LayeredImageIndexing(a1lx) => a1lx.derive_box_version(),
            _ => {}
        }
    }
}

const META_UNIQUE_CHILDREN: &[FourCC] = &[
    FourCC::HDLR,
    FourCC::PITM,
    FourCC::ILOC,
    FourCC::IINF,
    FourCC::IPRP,
    FourCC::IREF,
    FourCC::IDAT,
];

fn warn_on_duplicate_children(
    children: &[BmffBox],
    unique: &[FourCC],
    warnings: &mut Vec<HeifError>,
) {
    for &box_type in unique {
        if children.iter().filter(|c| c.box_type == box_type).count() > 1 {
            warnings.push(HeifError::DuplicateChild(box_type));
        }
    }
}

/// The top-level boxes of a file plus the non-fatal diagnostics collected
/// while reading them. `error` records the structural failure that stopped
/// the parse, if any; boxes read before it remain accessible.
#[derive(Debug, Default)]
pub struct BoxForest {
    pub boxes: Vec<BmffBox>,
    pub warnings: Vec<HeifError>,
    pub error: Option<HeifError>,
}

impl BoxForest {
    pub fn child_by_type(&self, box_type: FourCC) -> Option<&BmffBox> {
        self.boxes.iter().find(|b| b.box_type == box_type)
    }

    pub fn child_by_type_mut(&mut self, box_type: FourCC) -> Option<&mut BmffBox> {
        self.boxes.iter_mut().find(|b| b.box_type == box_type)
    }

    pub fn ftyp(&self) -> HeifResult<&FileTypeBox> {
        self.child_by_type(FourCC::FTYP)
            .and_then(|b| b.as_ftyp())
            .ok_or(HeifError::MissingRequiredChild(FourCC::FTYP))
    }

    pub fn meta(&self) -> HeifResult<&BmffBox> {
        self.child_by_type(FourCC::META)
            .ok_or(HeifError::MissingRequiredChild(FourCC::META))
    }
}

/// Reads the sequence of top-level boxes from `data`. Unknown FourCCs and
/// soft body failures are retained opaquely and reported in the forest's
/// warnings. A structural failure aborts the parse of the offending tree:
/// it is returned as `Err` if nothing was read yet, otherwise recorded in
/// `forest.error` with the earlier boxes kept accessible.
pub fn parse_top_level(data: &[u8]) -> HeifResult<BoxForest> {
    let mut stream = IStream::create(data);
    let mut forest = BoxForest::default();
    while stream.has_bytes_left() {
        match BmffBox::read(&mut stream, ParseContext::top_level(), &mut forest.warnings) {
            Ok(parsed) => forest.boxes.push(parsed),
            Err(err) => {
                if forest.boxes.is_empty() {
                    return Err(err);
                }
                forest.error = Some(err);
                break;
            }
        }
    }
    Ok(forest)
}

/// Serializes a forest: derive versions, validate cross-box invariants,
/// emit every box, then append the media payload queued on iloc (if any)
/// and patch the reserved offset fields.
pub fn write_file(stream: &mut OStream, forest: &mut BoxForest) -> HeifResult<()> {
    for top_level in &mut forest.boxes {
        top_level.derive_box_version_recursive();
    }
    if let Some(meta) = forest.child_by_type(FourCC::META) {
        if let Some(iprp_node) = meta.child_by_type(FourCC::IPRP) {
            iprp::validate_item_properties(iprp_node)?;
        }
    }
    for top_level in &mut forest.boxes {
        top_level.write(stream)?;
    }
    if let Some(meta) = forest.child_by_type_mut(FourCC::META) {
        if let Some(iloc) = meta
            .child_by_type_mut(FourCC::ILOC)
            .and_then(|b| b.as_iloc_mut())
        {
            if iloc.has_queued_data() {
                iloc.write_mdat_after_iloc(stream)?;
            }
        }
    }
    Ok(())
}
