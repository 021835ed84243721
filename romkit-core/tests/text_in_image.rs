use romkit_core::address::Flat;
use romkit_core::free_space::{FreeSpaceAllocator, GBA_FREE_SPACE_BYTE};
use romkit_core::relocate::{relocate, RelocationRequest, POINTER_SEARCH_RADIUS};
use romkit_core::schema::{SchemaDialect, SchemaRegistry};
use romkit_core::text::{CharacterTable, FieldKind, LineBreaks, TextCodec, TextConventions};
use romkit_core::RomImage;
use test_log::test;

const GB_TABLE: &str = "7F= \n80=A\n81=B\n82=C\n83=D\n84=E\n85=F\n86=G\n87=H\n88=I\n89=J\n8A=K\n8B=L\n8C=M\n8D=N\n8E=O\n8F=P\n90=Q\n91=R\n92=S\n93=T\n94=U\n95=V\n96=W\n97=X\n98=Y\n99=Z\nE7=!\nE8=.\n";

const GBA_TABLE: &str = "00= \nBB=A\nBC=B\nBD=C\nBE=D\nBF=E\nC0=F\nC1=G\nC2=H\nC3=I\nC4=J\nC5=K\nC6=L\nC7=M\nC8=N\nC9=O\nCA=P\nCB=Q\nCC=R\nCD=S\nCE=T\nCF=U\nD0=V\nD1=W\nD2=X\nD3=Y\nD4=Z\nAB=!\nAD=.\nB4='\nFE=\\n\nFA=\\l\nFB=\\p\n";

#[test]
fn names_are_rewritten_in_place_through_the_schema() {
    let registry = SchemaRegistry::parse(
        "[Gold (U)]\nGame=AAUE\nPokemonNamesOffset=0x40\nPokemonNamesLength=10\n",
        SchemaDialect::GAME_BOY,
    );
    let entry = registry.get("gold (u)").unwrap();
    let base = entry.offset("PokemonNamesOffset").unwrap();
    let len = entry.offset("PokemonNamesLength").unwrap();

    let codec = TextCodec::new(CharacterTable::parse(GB_TABLE), TextConventions::game_boy());
    let mut image = RomImage::new(vec![0x00; 0x100]);
    codec
        .write_fixed_length(&mut image, "BULBASAUR", base, len, FieldKind::Display)
        .unwrap();
    codec
        .write_fixed_length(&mut image, "IVYSAUR", base + len, len, FieldKind::Display)
        .unwrap();

    assert_eq!(codec.read_fixed_length(&image, base, len), "BULBASAUR");
    assert_eq!(codec.read_fixed_length(&image, base + len, len), "IVYSAUR");
    // Display fields pad with the terminator.
    assert_eq!(image[base + len + 7], 0x50);
    assert_eq!(codec.length_of_string_at(&image, base + len), 7);
}

#[test]
fn grown_text_is_relocated_and_every_pointer_copy_follows() {
    let registry = SchemaRegistry::parse(
        "[Emerald (U)]\nGame=BPEE\nFreeSpace=0x800\nTMText[]=[3,15,0,1,0xA9,IT'S [move]! A FINE MOVE TO TEACH YOUR TEAM.]\n",
        SchemaDialect::GAME_BOY_ADVANCE,
    );
    let entry = registry.get("Emerald (U)").unwrap();
    let codec = TextCodec::new(CharacterTable::parse(GBA_TABLE), TextConventions::game_boy_advance());
    let gba = Flat::GAME_BOY_ADVANCE;

    let mut bytes = vec![0x00; 0x1000];
    bytes[0x800..].fill(GBA_FREE_SPACE_BYTE);
    let mut image = RomImage::new(bytes);

    let old_text_at = 0x300;
    let written = codec.write_variable_length(&mut image, "OLD TEXT", old_text_at).unwrap();
    assert_eq!(written, 9);
    for site in [0x120, 0x180] {
        gba.write_pointer(&mut image, site, old_text_at).unwrap();
    }

    let patch = &entry.text_patches()[0];
    let text = patch.render_wrapped(
        "THUNDER WAVE",
        LineBreaks::GAME_BOY_ADVANCE,
        15,
        |word| codec.encoded_len(word).unwrap_or(word.len()),
    );
    let mut data = codec.encode(&text).unwrap().bytes;
    data.push(codec.conventions().terminator);

    let allocator = FreeSpaceAllocator::from_schema(entry, GBA_FREE_SPACE_BYTE);
    let moved = relocate(
        &mut image,
        &gba,
        &allocator,
        &RelocationRequest {
            data: &data,
            pointer_sites: &[0x120],
            search_radius: Some(POINTER_SEARCH_RADIUS),
        },
    )
    .unwrap();

    assert_eq!(moved.offset, 0x802);
    assert_eq!(moved.rewritten, vec![0x120, 0x180]);
    assert_eq!(moved.previous, vec![old_text_at, old_text_at]);
    for site in [0x120, 0x180] {
        let target = gba.read_pointer(&image, site).unwrap();
        assert_eq!(codec.read_variable_length(&image, target), text);
    }
    assert_eq!(
        text,
        "IT'S\\nTHUNDER WAVE! A\\lFINE MOVE TO\\lTEACH YOUR\\lTEAM."
    );
}
