pub mod constants;
pub mod countdown;
pub mod model;
pub mod wire;

pub use model::{
    Attachment, Chat, Drug, Prescription, PrescriptionDrug, RoomDetail, RoomPreview, SessionToken,
    Side, TokenPair,
};
pub use wire::{AuthData, ChatData, WsFrame};
