use ccsds_link::asm;
use ccsds_link::conv::Encoder;
use ccsds_link::frame::{FrameConfig, FrameHeader, Framer, Reassembler, FHP_IDLE, FHP_NONE};
use ccsds_link::pn::{DefaultRandomizer, Randomizer};
use ccsds_link::profile::{BodyMode, PacketType, Profile, SecHdrMode};
use ccsds_link::rs;
use ccsds_link::spacepacket::{self, MicMode, MicStatus, PrimaryHeader};
use ccsds_link::viterbi::{self, SoftMode, Trellis};

// Scenario 1 (spec.md §8): MIC OK.
#[test]
fn scenario_1_mic_ok() {
    let profile = Profile::builder()
        .name("tc_ns8_mic".into())
        .apid(0x0B3)
        .packet_type(PacketType::Tc)
        .sec_hdr(SecHdrMode::Ns8)
        .body(BodyMode::Ascii {
            text: "0.21/data/".into(),
        })
        .pad_byte(0x00)
        .use_mic(true)
        .data_field_len(138)
        .build();

    let user = profile.body.render(0);
    let dat = spacepacket::encode(&profile, &user, 0, 0).unwrap();
    assert_eq!(dat.len(), 144);

    let parsed = spacepacket::parse(&profile, &dat, MicMode::Auto).unwrap();
    assert_eq!(parsed.mic_status, MicStatus::Ok);
    assert_eq!(parsed.user.len(), 138 - 8 - 4);
    assert_eq!(&parsed.user[..10], b"0.21/data/");
    assert!(parsed.user[10..].iter().all(|&b| b == 0));
}

// Scenario 2: no secondary header.
#[test]
fn scenario_2_no_secondary_header() {
    let profile = Profile::builder()
        .name("tm_pattern".into())
        .apid(0x1FE)
        .packet_type(PacketType::Tm)
        .sec_hdr(SecHdrMode::None)
        .body(BodyMode::Pattern16)
        .use_mic(false)
        .data_field_len(16)
        .build();

    let user = profile.body.render(16);
    let dat = spacepacket::encode(&profile, &user, 0, 0).unwrap();
    assert_eq!(dat.len(), 22);
    let header = PrimaryHeader::decode(&dat).unwrap();
    assert_eq!(header.len_minus1, 0x000F);
    assert_eq!(&dat[6..], &(0u16..16).map(|n| (n % 16) as u8).collect::<Vec<_>>()[..]);
}

// Scenario 3: fixed secondary header + MIC.
#[test]
fn scenario_3_fixed_secondary_header_with_mic() {
    let profile = Profile::builder()
        .name("fixed_hdr".into())
        .apid(0x10)
        .packet_type(PacketType::Tm)
        .sec_hdr(SecHdrMode::Fixed {
            hex: "DEADBEEF".into(),
        })
        .body(BodyMode::Pattern16)
        .use_mic(true)
        .data_field_len(32)
        .build();

    let user_len = 32 - 4 - 4;
    let user = profile.body.render(user_len);
    let dat = spacepacket::encode(&profile, &user, 0, 0).unwrap();
    let header = PrimaryHeader::decode(&dat).unwrap();
    assert_eq!(header.len_minus1, 31);

    let user = &dat[6 + 4..6 + 4 + user_len];
    let want_mic = ccsds_link::crc::crc32c(user);
    let got_mic = u32::from_be_bytes(dat[dat.len() - 4..].try_into().unwrap());
    assert_eq!(want_mic, got_mic);
}

// Scenario 4: TM frame segmentation across three packets.
#[test]
fn scenario_4_tm_frame_segmentation() {
    let cfg = FrameConfig {
        scid: 7,
        vcid: 0,
        frame_len: 6 + 1103,
        use_fecf: false,
        idle_enabled: true,
        idle_byte: 0,
    };
    let mut framer = Framer::new(cfg);
    for len in [500usize, 700, 600] {
        framer.push_packet(make_packet(len));
    }

    let frame1 = framer.try_emit_frame().unwrap();
    let header1 = FrameHeader::decode(&frame1).unwrap();
    assert_eq!(header1.fhp, 0);

    let frame2 = framer.try_emit_frame().unwrap();
    let header2 = FrameHeader::decode(&frame2).unwrap();
    assert_ne!(header2.fhp, FHP_NONE);
    assert_ne!(header2.fhp, FHP_IDLE);

    // The continuation bytes of packet 2 precede packet 3 at header2.fhp.
    let tfdf2 = &frame2[FrameHeader::LEN..];
    assert!(header2.fhp as usize > 0);
    let new_header_bytes = &tfdf2[header2.fhp as usize..header2.fhp as usize + PrimaryHeader::LEN];
    let new_header = PrimaryHeader::decode(new_header_bytes).unwrap();
    assert_eq!(new_header.len_minus1 as usize + 1 + PrimaryHeader::LEN, 600);
}

fn make_packet(total_len: usize) -> Vec<u8> {
    let header = PrimaryHeader {
        version: 0,
        type_flag: 0,
        has_secondary_header: false,
        apid: 1,
        sequence_flags: spacepacket::SEQ_UNSEGMENTED,
        sequence_id: 0,
        len_minus1: (total_len - PrimaryHeader::LEN - 1) as u16,
    };
    let mut out = header.encode().to_vec();
    out.resize(total_len, 0xAB);
    out
}

// Scenario 5: RS interleave recovers errors landing in different
// sub-codewords.
#[test]
fn scenario_5_rs_interleave_recovers_errors() {
    let interleave = 5usize;
    let frame: Vec<u8> = (0..rs::K * interleave).map(|n| (n % 251) as u8).collect();
    let mut codeblock = rs::encode_interleaved(&frame, interleave).unwrap();

    codeblock[2] ^= 0xFF;
    codeblock[8] ^= 0xFF; // 8 % interleave == 3, a different sub-codeword than 2 % interleave == 2

    let (decoded, outcomes) = rs::decode_interleaved(&codeblock, interleave).unwrap();
    assert_eq!(decoded, frame);
    assert!(outcomes.iter().all(std::result::Result::is_ok));
}

// Scenario 6: Viterbi soft decode of 0x01..=0xFF.
#[test]
fn scenario_6_viterbi_soft_decode() {
    let trellis = Trellis::new();
    let frame: Vec<u8> = (1u16..=255).map(|n| n as u8).collect();
    assert_eq!(frame.len(), 255);

    let mut enc = Encoder::new();
    let coded = enc.encode_frame(&frame);

    let mut bits = Vec::with_capacity(coded.len() * 8);
    for byte in &coded {
        for shift in (0..8).rev() {
            bits.push((byte >> shift) & 1);
        }
    }
    let softs: Vec<f64> = bits.iter().map(|&b| if b == 0 { 1.0 } else { -1.0 }).collect();
    let decoded = viterbi::decode(&trellis, &softs, SoftMode::Pm1);

    assert_eq!(decoded, frame);
    assert_eq!(decoded.len(), 255);
}

// Cross-cutting: randomizer involution and ASM alignment over a full CADU.
#[test]
fn randomizer_involution_and_asm_alignment() {
    let r = DefaultRandomizer::default();
    let frame: Vec<u8> = (0..223u32).map(|n| (n % 241) as u8).collect();
    let masked = r.apply(&frame);
    assert_eq!(r.apply(&masked), frame);

    let codeblock = rs::encode_interleaved(&masked, 1).unwrap();
    let cadu = asm::insert(&codeblock);
    assert_eq!(&cadu[..4], &asm::ASM);
    assert_eq!(cadu.len(), 4 + 255);
}

// Reassembler round trip across a segmented packet, mirroring scenario 4
// but driving both the Framer and Reassembler together.
#[test]
fn framer_and_reassembler_agree_on_segmented_packet() {
    let cfg = FrameConfig {
        scid: 3,
        vcid: 2,
        frame_len: 6 + 100,
        use_fecf: true,
        idle_enabled: true,
        idle_byte: 0,
    };
    let mut framer = Framer::new(cfg);
    let pkt = make_packet(250);
    framer.push_packet(pkt.clone());

    let mut reassembler = Reassembler::new();
    let mut recovered = Vec::new();
    for _ in 0..3 {
        let frame = framer.try_emit_frame().unwrap();
        let header = FrameHeader::decode(&frame).unwrap();
        let tfdf = &frame[FrameHeader::LEN..frame.len() - 2];
        recovered.extend(reassembler.push_frame(&header, tfdf));
    }

    assert_eq!(recovered, vec![pkt]);
}
