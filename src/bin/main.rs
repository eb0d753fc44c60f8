fn main() {
    galena::main()
}
